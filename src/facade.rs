//! Composes the object store, cache store, and state-store-backed
//! coordination components into the two operations callers actually use:
//! `cutout` (read) and `write_cuboid` (write), plus `reserve_ids`. Grounded on
//! spec.md §4.9/§4.10's step-by-step protocol.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::instrument;

use crate::error::SpdbError;
use crate::key_codec::{cached_cuboid_key, delayed_write_key, parse_write_cuboid_key, write_cuboid_key, CuboidAddress};
use crate::object_store::{generate_object_key, ObjectStore};
use crate::cache_store::CacheStore;
use crate::delayed_write::DelayedWriteQueue;
use crate::page_in::PageInCoordinator;
use crate::page_out::PageOutTracker;
use crate::region::{self, Coord3, CuboidSize};
use crate::resource::ResourceDescriptor;
use crate::state_store::StateStore;
use crate::write_lock::WriteLock;

pub struct SpatialDb<O: ObjectStore + ?Sized, C: CacheStore + ?Sized, S: StateStore + ?Sized> {
    object_store: Arc<O>,
    cache_store: Arc<C>,
    state_store: Arc<S>,
    page_in: PageInCoordinator<S>,
    page_out: PageOutTracker<S>,
    delayed_write: DelayedWriteQueue<S>,
    write_lock: WriteLock<S>,
    cache_ttl: Duration,
    cuboid_size: CuboidSize,
    page_in_timeout: Duration,
}

impl<O: ObjectStore + ?Sized, C: CacheStore + ?Sized, S: StateStore + ?Sized> SpatialDb<O, C, S> {
    pub fn new(
        object_store: Arc<O>,
        cache_store: Arc<C>,
        state_store: Arc<S>,
        cuboid_size: CuboidSize,
        cache_ttl: Duration,
        page_in_timeout: Duration,
    ) -> Self {
        Self {
            page_in: PageInCoordinator::new(state_store.clone()),
            page_out: PageOutTracker::new(state_store.clone()),
            delayed_write: DelayedWriteQueue::new(state_store.clone()),
            write_lock: WriteLock::new(state_store.clone()),
            object_store,
            cache_store,
            state_store,
            cache_ttl,
            cuboid_size,
            page_in_timeout,
        }
    }

    /// Read path: assemble a cutout of `extent` voxels starting at `corner`,
    /// spanning `t_range`, paging in any cache misses. `morton_encode` turns
    /// a `(x_cuboid, y_cuboid, z_cuboid)` triple into the Morton key used to
    /// address cuboids; computing it is the numeric cutout math spec.md §1
    /// calls out of scope, so the caller supplies it.
    #[instrument(skip(self, morton_encode), fields(lookup = %resource.lookup_key(), resolution))]
    pub async fn cutout(
        &self,
        resource: &ResourceDescriptor,
        resolution: u32,
        corner: Coord3,
        extent: Coord3,
        t_range: Range<u64>,
        morton_encode: impl Fn(i64, i64, i64) -> u64,
    ) -> Result<Bytes, SpdbError> {
        let cuboids = region::get_cuboid_aligned_sub_region(self.cuboid_size, corner, extent);
        let lookup = resource.lookup_key();

        // (t, z, y, x) row-major per spec.md §6.
        let mut addrs = Vec::new();
        for t in t_range {
            for z in cuboids.z_cuboids.clone() {
                for y in cuboids.y_cuboids.clone() {
                    for x in cuboids.x_cuboids.clone() {
                        let morton = morton_encode(x, y, z);
                        addrs.push(CuboidAddress::new(lookup.clone(), resolution, t, morton));
                    }
                }
            }
        }

        let mut found: HashMap<CuboidAddress, Bytes> = HashMap::new();
        let mut misses = Vec::new();
        for addr in &addrs {
            let key = cached_cuboid_key(addr);
            match self.cache_store.get(&key).await.map_err(anyhow_state)? {
                Some(bytes) => {
                    found.insert(addr.clone(), bytes);
                }
                None => misses.push(addr.clone()),
            }
        }

        if !misses.is_empty() {
            let channel = self.page_in.create_channel().await?;
            let miss_keys: Vec<String> = misses.iter().map(cached_cuboid_key).collect();
            self.page_in.enqueue_cache_misses(&miss_keys).await?;
            let pending: HashSet<String> = miss_keys.iter().cloned().collect();
            self.page_in.wait_for(&pending, channel, self.page_in_timeout).await?;

            for addr in &misses {
                let key = cached_cuboid_key(addr);
                let bytes = self
                    .cache_store
                    .get(&key)
                    .await
                    .map_err(anyhow_state)?
                    .ok_or_else(|| {
                        SpdbError::Generic(anyhow::anyhow!(
                            "cache miss persisted after page-in wait: {key}"
                        ))
                    })?;
                found.insert(addr.clone(), bytes);
            }
        }

        let mut assembled = Vec::new();
        for addr in &addrs {
            if let Some(bytes) = found.get(addr) {
                assembled.extend_from_slice(bytes);
            }
        }
        Ok(Bytes::from(assembled))
    }

    /// Write path per spec.md §4.10. Returns once the write has either been
    /// committed to object storage or durably enqueued for later draining.
    #[instrument(skip(self, bytes), fields(lookup = %resource.lookup_key(), resolution, t, morton))]
    pub async fn write_cuboid(
        &self,
        resource: &ResourceDescriptor,
        resolution: u32,
        t: u64,
        morton: u64,
        bytes: Bytes,
    ) -> Result<(), SpdbError> {
        let lookup = resource.lookup_key();
        if self
            .write_lock
            .is_locked(&lookup)
            .await
            .map_err(anyhow_state)?
        {
            return Err(SpdbError::ChannelLocked);
        }

        let addr = CuboidAddress::new(lookup, resolution, t, morton);
        let id = uuid::Uuid::new_v4();
        let key = write_cuboid_key(&addr, &id);
        self.cache_store
            .set(&key, bytes.clone(), self.cache_ttl)
            .await
            .map_err(anyhow_state)?;

        let scratch_key = format!("PAGE-OUT-SCRATCH&{id}");
        let in_pageout = self.page_out.add_to_page_out(&scratch_key, &addr).await?;

        if in_pageout {
            let resource_bytes =
                serde_json::to_string(resource).map_err(|e| SpdbError::Generic(e.into()))?;
            self.delayed_write
                .add(&key, &addr, &resource_bytes)
                .await
                .map_err(anyhow_state)?;
            return Ok(());
        }

        self.commit_and_drain(key, addr, bytes, resource.clone()).await
    }

    /// Only valid for annotation (integer-label) channels/layers; atomically
    /// reserves `count` ids and returns the first one. Supplements spec.md §6
    /// with the original's `create_id_counter_key`/`reserve_id` semantics.
    pub async fn reserve_ids(
        &self,
        resource: &ResourceDescriptor,
        count: u64,
    ) -> Result<u64, SpdbError> {
        if resource.is_channel() {
            return Err(SpdbError::DatatypeNotSupported);
        }
        let counter_key = format!("ID-COUNTER&{}", resource.lookup_key());
        let new_value = self
            .state_store
            .incr_by(&counter_key, count as i64)
            .await
            .map_err(anyhow_state)?;
        Ok(new_value as u64 - count + 1)
    }

    /// Commits one write-cuboid to object storage, then drains the delayed
    /// queue for the same tuple in FIFO order, passing the flush baton along
    /// until the queue runs dry. Iterative, not recursive, to keep the async
    /// call stack flat regardless of queue depth.
    async fn commit_and_drain(
        &self,
        mut key: String,
        mut addr: CuboidAddress,
        mut bytes: Bytes,
        mut resource: ResourceDescriptor,
    ) -> Result<(), SpdbError> {
        loop {
            let object_key = generate_object_key(&resource, &addr, 0);
            if let Err(e) = self.object_store.put(&object_key, bytes.clone()).await {
                self.write_lock
                    .set(&addr.lookup_key, true)
                    .await
                    .map_err(anyhow_state)?;
                return Err(SpdbError::Io(e));
            }

            // Overwrite-with-fresh-content per the open design choice
            // resolved in SPEC_FULL.md §9.
            let cache_key = cached_cuboid_key(&addr);
            self.cache_store
                .set(&cache_key, bytes.clone(), self.cache_ttl)
                .await
                .map_err(anyhow_state)?;
            self.page_out
                .remove_from_page_out(&key)
                .await
                .map_err(anyhow_state)?;

            let queue_key = delayed_write_key(&addr);
            match self
                .delayed_write
                .drain(&queue_key)
                .await
                .map_err(anyhow_state)?
            {
                None => return Ok(()),
                Some((next_key, resource_bytes)) => {
                    let (next_addr, _) = parse_write_cuboid_key(&next_key);
                    let next_bytes = self
                        .cache_store
                        .get(&next_key)
                        .await
                        .map_err(anyhow_state)?
                        .ok_or_else(|| {
                            SpdbError::Generic(anyhow::anyhow!(
                                "staged write-cuboid bytes missing for {next_key}"
                            ))
                        })?;
                    let next_resource: ResourceDescriptor = serde_json::from_str(&resource_bytes)
                        .map_err(|e| SpdbError::Generic(e.into()))?;
                    key = next_key;
                    addr = next_addr;
                    bytes = next_bytes;
                    resource = next_resource;
                }
            }
        }
    }
}

fn anyhow_state<E: std::error::Error + Send + Sync + 'static>(e: E) -> SpdbError {
    SpdbError::StateStore(anyhow::Error::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::InMemoryCacheStore;
    use crate::object_store::{InMemoryObjectStore, ObjectKey};
    use crate::resource::{ChannelOrLayer, Collection, CoordinateFrame, Datatype, Experiment};
    use crate::state_store::InMemoryStateStore;
    use async_trait::async_trait;

    fn sample_resource(lookup: (u64, u64, u64), channel: bool) -> ResourceDescriptor {
        let channel_or_layer = if channel {
            ChannelOrLayer::Channel {
                name: "chan".into(),
                description: String::new(),
                datatype: Datatype::Uint8,
            }
        } else {
            ChannelOrLayer::Layer {
                name: "lyr".into(),
                description: String::new(),
                datatype: Datatype::Uint64,
                base_resolution: 0,
                parent_channels: vec![],
            }
        };
        ResourceDescriptor {
            collection: Collection {
                name: "coll".into(),
                description: String::new(),
            },
            coord_frame: CoordinateFrame {
                name: "cf".into(),
                description: String::new(),
                x_start: 0,
                x_stop: 1000,
                y_start: 0,
                y_stop: 1000,
                z_start: 0,
                z_stop: 100,
                x_voxel_size: 1.0,
                y_voxel_size: 1.0,
                z_voxel_size: 1.0,
                voxel_unit: "nanometers".into(),
                time_step: 0.0,
                time_step_unit: "seconds".into(),
            },
            experiment: Experiment {
                name: "exp".into(),
                description: String::new(),
                num_hierarchy_levels: 6,
                hierarchy_method: "isotropic".into(),
                max_time_sample: 0,
            },
            channel_or_layer,
            collection_id: lookup.0,
            experiment_id: lookup.1,
            channel_id: lookup.2,
        }
    }

    fn db() -> SpatialDb<InMemoryObjectStore, InMemoryCacheStore, InMemoryStateStore> {
        SpatialDb::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryCacheStore::new()),
            Arc::new(InMemoryStateStore::new()),
            CuboidSize::default(),
            Duration::from_secs(30),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn single_write_no_contention_lands_in_object_store_and_cache() {
        let resource = sample_resource((1, 2, 3), true);
        let db = db();
        let bytes = Bytes::from(vec![7u8; 1024 * 1024]);

        db.write_cuboid(&resource, 0, 0, 42, bytes.clone())
            .await
            .unwrap();

        let addr = CuboidAddress::new(resource.lookup_key(), 0, 0, 42);
        let object_key = generate_object_key(&resource, &addr, 0);
        let stored = db.object_store.get(&object_key).await.unwrap();
        assert_eq!(stored, bytes);

        let cached = db
            .cache_store
            .get(&cached_cuboid_key(&addr))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, bytes);

        assert!(!db
            .page_out
            .in_page_out("probe", &addr)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn concurrent_writes_to_same_tuple_drain_in_order() {
        let resource = sample_resource((1, 2, 3), true);
        let db = db();
        let addr = CuboidAddress::new(resource.lookup_key(), 0, 0, 7);

        // Simulate W1 claiming page-out directly so W2 is forced to delay.
        db.page_out
            .add_to_page_out("w1-scratch", &addr)
            .await
            .unwrap();

        let w2_bytes = Bytes::from_static(b"w2-content");
        db.write_cuboid(&resource, 0, 0, 7, w2_bytes.clone())
            .await
            .unwrap();

        let queue_key = delayed_write_key(&addr);
        assert!(!db.delayed_write.list_queues().await.unwrap().is_empty());

        // W1 now commits, which should drain and commit W2's enqueued write.
        let w1_key = write_cuboid_key(&addr, &uuid::Uuid::new_v4());
        db.commit_and_drain(
            w1_key,
            addr.clone(),
            Bytes::from_static(b"w1-content"),
            resource.clone(),
        )
        .await
        .unwrap();

        assert!(db.delayed_write.list_queues().await.unwrap().is_empty()
            || db.delayed_write.peek(&queue_key).await.unwrap() == false);

        let object_key = generate_object_key(&resource, &addr, 0);
        let final_bytes = db.object_store.get(&object_key).await.unwrap();
        assert_eq!(final_bytes, w2_bytes);

        assert!(!db.page_out.in_page_out("probe2", &addr).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn page_in_timeout_with_no_background_worker() {
        let resource = sample_resource((9, 9, 1), true);
        let db = db();

        // No worker ever populates the cache or publishes completion, so this
        // must time out rather than hang. Paused time auto-advances past the
        // poll/sleep backoffs straight to the deadline.
        let result = db
            .cutout(&resource, 0, (0, 0, 0), (512, 512, 16), 0..1, |_x, _y, _z| 0)
            .await;
        assert!(matches!(result, Err(SpdbError::Async(_))));
    }

    #[tokio::test]
    async fn write_failure_poisons_the_channel() {
        /// Fails `put` only for object keys under `poisoned_prefix`, so the
        /// test can assert writes to other lookups keep succeeding against
        /// the same store (spec.md §8 scenario 4).
        struct PartiallyFailingObjectStore {
            poisoned_prefix: String,
            inner: InMemoryObjectStore,
        }

        #[async_trait]
        impl ObjectStore for PartiallyFailingObjectStore {
            async fn put(
                &self,
                key: &ObjectKey,
                bytes: Bytes,
            ) -> Result<(), crate::error::ObjectStoreError> {
                if key.0.starts_with(&self.poisoned_prefix) {
                    return Err(crate::error::ObjectStoreError::Io(anyhow::anyhow!(
                        "disk full"
                    )));
                }
                self.inner.put(key, bytes).await
            }
            async fn get(&self, key: &ObjectKey) -> Result<Bytes, crate::error::ObjectStoreError> {
                self.inner.get(key).await
            }
        }

        let poisoned = sample_resource((9, 9, 9), true);
        let db = SpatialDb::new(
            Arc::new(PartiallyFailingObjectStore {
                poisoned_prefix: poisoned.lookup_key(),
                inner: InMemoryObjectStore::new(),
            }),
            Arc::new(InMemoryCacheStore::new()),
            Arc::new(InMemoryStateStore::new()),
            CuboidSize::default(),
            Duration::from_secs(30),
            Duration::from_millis(200),
        );

        let err = db
            .write_cuboid(&poisoned, 0, 0, 1, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpdbError::Io(_)));

        let second = db
            .write_cuboid(&poisoned, 0, 0, 1, Bytes::from_static(b"y"))
            .await
            .unwrap_err();
        assert!(matches!(second, SpdbError::ChannelLocked));

        let other = sample_resource((1, 1, 1), true);
        db.write_cuboid(&other, 0, 0, 1, Bytes::from_static(b"z"))
            .await
            .expect("writes to other lookups succeed despite the poisoned channel");
    }

    #[tokio::test]
    async fn reserve_ids_fails_on_image_channels() {
        let db = db();
        let channel = sample_resource((1, 2, 3), true);
        let err = db.reserve_ids(&channel, 10).await.unwrap_err();
        assert!(matches!(err, SpdbError::DatatypeNotSupported));
    }

    #[tokio::test]
    async fn reserve_ids_reserves_a_contiguous_block_for_layers() {
        let db = db();
        let layer = sample_resource((1, 2, 3), false);
        let first = db.reserve_ids(&layer, 10).await.unwrap();
        let second = db.reserve_ids(&layer, 5).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 11);
    }
}
