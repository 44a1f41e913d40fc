//! A per-channel/layer flag set when an unrecoverable flush failure leaves
//! the cache and object store out of sync. Once set, the facade refuses
//! further writes to that resource until an operator clears it.
//!
//! `is_locked` is grounded on `state.py::project_locked` (same
//! `WRITE-LOCK&<lookup>` key, same exists-check). The original never exposes
//! a setter for this key -- nothing in the retrieved source ever locks a
//! channel/layer -- so `set()` is new functionality this crate adds to
//! satisfy spec.md §4.8's "a failed flush must leave the channel locked"
//! requirement, built the way `project_locked` reads the key (`StateStore`
//! string get/set over the same key shape).

use std::sync::Arc;

use crate::error::StateStoreError;
use crate::key_codec::write_lock_key;
use crate::state_store::StateStore;

pub struct WriteLock<S: StateStore + ?Sized> {
    state_store: Arc<S>,
}

impl<S: StateStore + ?Sized> WriteLock<S> {
    pub fn new(state_store: Arc<S>) -> Self {
        Self { state_store }
    }

    pub async fn is_locked(&self, lookup_key: &str) -> Result<bool, StateStoreError> {
        self.state_store.exists(&write_lock_key(lookup_key)).await
    }

    /// Set or clear the lock. Locking is permanent until an operator (out of
    /// scope for this crate) clears it explicitly, per spec.md §4.7's note
    /// that no automatic unlock path exists.
    pub async fn set(&self, lookup_key: &str, locked: bool) -> Result<(), StateStoreError> {
        let key = write_lock_key(lookup_key);
        if locked {
            self.state_store.string_set(&key, "1").await
        } else {
            self.state_store.delete(&key).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    #[tokio::test]
    async fn unlocked_channel_reports_unlocked() {
        let store = Arc::new(InMemoryStateStore::new());
        let lock = WriteLock::new(store);
        assert!(!lock.is_locked("1&2&3").await.unwrap());
    }

    #[tokio::test]
    async fn set_then_clear_round_trips() {
        let store = Arc::new(InMemoryStateStore::new());
        let lock = WriteLock::new(store);
        lock.set("1&2&3", true).await.unwrap();
        assert!(lock.is_locked("1&2&3").await.unwrap());
        lock.set("1&2&3", false).await.unwrap();
        assert!(!lock.is_locked("1&2&3").await.unwrap());
    }
}
