//! Cold object storage: content-addressed cuboid blobs, put/get only. The
//! core never lists or deletes objects directly (that's the scrubber's job,
//! out of scope here) and does not assume read-after-write consistency
//! globally — it relies on the cache as the authoritative hot view until the
//! page-out entry is removed (spec.md §4.2).
//!
//! Shaped like `remote_storage::RemoteStorage`/`GenericRemoteStorage`: a
//! trait with a small, focused surface and two implementations, one real
//! (`S3ObjectStore`, via `aws-sdk-s3`) and one for tests (`InMemoryObjectStore`,
//! grounded on `remote_storage`'s `UnreliableWrapper` pattern of wrapping a
//! trait object for deterministic test behavior).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::ObjectStoreError;
use crate::key_codec::CuboidAddress;
use crate::resource::ResourceDescriptor;

/// Deterministic, content-independent key for a cuboid's object-store blob.
/// Collision-free across resources because it's keyed by lookup_key (unique
/// per channel) plus resolution/time/morton plus a content version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(pub String);

/// Mint the object-store key for a cuboid. `version` lets a resource be
/// rewritten without colliding with an in-flight reader of the previous
/// version; the facade always writes version 0 today (spec.md §2 describes
/// the format as `(resource-hash, resolution, time, morton, version)` without
/// mandating version bumps beyond that tuple shape).
pub fn generate_object_key(
    resource: &ResourceDescriptor,
    addr: &CuboidAddress,
    version: u32,
) -> ObjectKey {
    ObjectKey(format!(
        "{}/{}/{}/{}/{}",
        resource.lookup_key(),
        addr.resolution,
        addr.time_sample,
        addr.morton,
        version
    ))
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn put(&self, key: &ObjectKey, bytes: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &ObjectKey) -> Result<Bytes, ObjectStoreError>;
}

/// Production object store backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS environment/profile, the way
    /// `storage_scrubber::init_s3_client` does.
    pub async fn from_env(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let region = aws_sdk_s3::config::Region::new(region.into());
        let config = aws_config::defaults(aws_config::BehaviorVersion::v2024_03_28())
            .region(region)
            .load()
            .await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, key = %key.0))]
    async fn put(&self, key: &ObjectKey, bytes: Bytes) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key.0)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Io(anyhow::anyhow!(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key.0))]
    async fn get(&self, key: &ObjectKey) -> Result<Bytes, ObjectStoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key.0)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("NoSuchKey") {
                    ObjectStoreError::NotFound(key.0.clone())
                } else {
                    ObjectStoreError::Io(anyhow::anyhow!(msg))
                }
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Io(anyhow::anyhow!(e.to_string())))?
            .into_bytes();
        Ok(bytes)
    }
}

/// In-memory test double. Not behind `cfg(test)` so downstream crates can
/// exercise the facade without a live bucket (see the `testing` feature).
#[derive(Default, Clone)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &ObjectKey, bytes: Bytes) -> Result<(), ObjectStoreError> {
        self.objects.lock().await.insert(key.0.clone(), bytes);
        Ok(())
    }

    async fn get(&self, key: &ObjectKey) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .await
            .get(&key.0)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryObjectStore::new();
        let key = ObjectKey("some/key".into());
        store.put(&key, Bytes::from_static(b"hello")).await.unwrap();
        let got = store.get(&key).await.unwrap();
        assert_eq!(got, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        let key = ObjectKey("nope".into());
        let err = store.get(&key).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }
}
