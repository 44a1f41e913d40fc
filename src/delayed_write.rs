//! A per-`(channel, resolution, time, morton)` FIFO of staged write-cuboid
//! keys, each paired with a serialized resource descriptor so a background
//! drainer can complete the write later.
//!
//! Grounded on `state.py::add_to_delayed_write`/`get_delayed_write_keys`.
//! The open question in spec.md §9 (a producer enqueueing between the
//! drainer's pop and its paired-resource delete loses its resource binding)
//! is resolved per SPEC_FULL.md §9 item 2: the resource key is suffixed with
//! the *same* uuid as the write-cuboid key it is paired with, so every
//! enqueued element owns an exclusive resource key that no other element can
//! ever collide with or overwrite.

use std::sync::Arc;

use tracing::instrument;

use crate::error::StateStoreError;
use crate::key_codec::{
    delayed_write_key, delayed_write_scan_pattern, parse_write_cuboid_key,
    resource_delayed_write_key, CuboidAddress,
};
use crate::state_store::StateStore;

pub struct DelayedWriteQueue<S: StateStore + ?Sized> {
    state_store: Arc<S>,
}

impl<S: StateStore + ?Sized> DelayedWriteQueue<S> {
    pub fn new(state_store: Arc<S>) -> Self {
        Self { state_store }
    }

    /// Push `write_cuboid_key` onto the queue for `addr` and set the paired,
    /// uuid-versioned resource key with the serialized descriptor.
    #[instrument(skip(self, resource_bytes), fields(lookup = %addr.lookup_key, res = addr.resolution, t = addr.time_sample, morton = addr.morton))]
    pub async fn add(
        &self,
        write_cuboid_key: &str,
        addr: &CuboidAddress,
        resource_bytes: &str,
    ) -> Result<(), StateStoreError> {
        let (_, uuid) = parse_write_cuboid_key(write_cuboid_key);
        let resource_key = resource_delayed_write_key(addr, &uuid);
        self.state_store
            .string_set(&resource_key, resource_bytes)
            .await?;
        self.state_store
            .list_push(&delayed_write_key(addr), write_cuboid_key)
            .await?;
        Ok(())
    }

    /// Pattern-scan every `DELAYED-WRITE*` queue key.
    pub async fn list_queues(&self) -> Result<Vec<String>, StateStoreError> {
        self.state_store
            .keys_matching(&delayed_write_scan_pattern())
            .await
    }

    /// Non-destructive existence check: used to decide whether to begin
    /// draining without mutating the queue. Advisory only -- `drain` is
    /// itself non-blocking and safe to call speculatively even if `peek`
    /// raced a concurrent drainer and is already stale.
    pub async fn peek(&self, queue_key: &str) -> Result<bool, StateStoreError> {
        self.state_store.exists(queue_key).await
    }

    /// Pop the head of `queue_key` and fetch its paired resource bytes. A
    /// `WATCH` on `queue_key` guards the pop, so a drainer racing another
    /// drainer never observes a half-destroyed pair; since the resource key
    /// is uuid-scoped there is no further race to guard once the pop
    /// succeeds. Returns `None` on a watch conflict (the caller bails; a
    /// later scheduler pass picks it back up) or if the queue was empty.
    #[instrument(skip(self))]
    pub async fn drain(
        &self,
        queue_key: &str,
    ) -> Result<Option<(String, String)>, StateStoreError> {
        let popped = match self.state_store.drain_delayed(queue_key).await? {
            None => return Ok(None),
            Some(None) => return Ok(None),
            Some(Some(write_cuboid_key)) => write_cuboid_key,
        };

        let (addr, uuid) = parse_write_cuboid_key(&popped);
        let resource_key = resource_delayed_write_key(&addr, &uuid);
        let resource_bytes = self
            .state_store
            .string_get(&resource_key)
            .await?
            .unwrap_or_default();

        // Once the drained write has been durably committed by the caller,
        // the resource key is no longer needed; deleting it here (rather
        // than coupling it with the pop) is safe precisely because the key
        // is uuid-scoped and cannot be reused by a later producer.
        self.state_store.delete(&resource_key).await?;

        Ok(Some((popped, resource_bytes)))
    }
}
