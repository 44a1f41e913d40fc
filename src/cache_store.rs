//! The hot, TTL'd byte store: read-through cache entries (`CACHED-CUBOID`)
//! and the write staging area (`WRITE-CUBOID`). Eviction is the provider's
//! responsibility (Redis' own TTL mechanism in production); the core treats
//! a miss as normal, never an error (spec.md §4.3, I3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CacheStoreError;

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn set(&self, key: &str, bytes: Bytes, ttl: Duration) -> Result<(), CacheStoreError>;
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheStoreError>;
    async fn mset(&self, items: &[(String, Bytes, Duration)]) -> Result<(), CacheStoreError>;
    /// Delete every key matching a glob `pattern` (e.g. a resolution's worth
    /// of cached cuboids on invalidation).
    async fn delete_keys(&self, pattern: &str) -> Result<(), CacheStoreError>;
}

/// Production cache store backed by Redis, via a multiplexed async
/// connection (matches the teacher workspace's `redis = "0.25.2"` dependency
/// with the `tokio-rustls-comp` feature already enabled for async use).
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn set(&self, key: &str, bytes: Bytes, ttl: Duration) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, bytes.to_vec(), seconds)
            .await
            .map_err(|e| CacheStoreError::Backend(e.into()))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheStoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheStoreError::Backend(e.into()))?;
        Ok(value.map(Bytes::from))
    }

    async fn mset(&self, items: &[(String, Bytes, Duration)]) -> Result<(), CacheStoreError> {
        // Redis MSET has no per-key TTL, so we pipeline individual SETEX
        // calls instead, matching the individual-key granularity the spec's
        // TTL model requires.
        let mut pipe = redis::pipe();
        for (key, bytes, ttl) in items {
            pipe.set_ex(key, bytes.to_vec(), ttl.as_secs().max(1));
        }
        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| CacheStoreError::Backend(e.into()))
    }

    async fn delete_keys(&self, pattern: &str) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| CacheStoreError::Backend(e.into()))?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| CacheStoreError::Backend(e.into()))?;
        }
        Ok(())
    }
}

struct Entry {
    bytes: Bytes,
    expires_at: Instant,
}

/// In-memory test double with real TTL semantics (checked on read), so the
/// expiry-is-never-an-error contract (I3) is exercisable without Redis.
#[derive(Default, Clone)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn set(&self, key: &str, bytes: Bytes, ttl: Duration) -> Result<(), CacheStoreError> {
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                bytes,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheStoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn mset(&self, items: &[(String, Bytes, Duration)]) -> Result<(), CacheStoreError> {
        let mut entries = self.entries.lock().await;
        for (key, bytes, ttl) in items {
            entries.insert(
                key.clone(),
                Entry {
                    bytes: bytes.clone(),
                    expires_at: Instant::now() + *ttl,
                },
            );
        }
        Ok(())
    }

    async fn delete_keys(&self, pattern: &str) -> Result<(), CacheStoreError> {
        let prefix = pattern.trim_end_matches('*');
        self.entries.lock().await.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryCacheStore::new();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn miss_is_not_an_error() {
        let store = InMemoryCacheStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_reads_as_miss() {
        let store = InMemoryCacheStore::new();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_keys_matches_prefix_pattern() {
        let store = InMemoryCacheStore::new();
        store
            .set("CACHED-CUBOID&1&0&0&1", Bytes::new(), Duration::from_secs(30))
            .await
            .unwrap();
        store
            .set("CACHED-CUBOID&1&0&0&2", Bytes::new(), Duration::from_secs(30))
            .await
            .unwrap();
        store
            .set("OTHER&1", Bytes::new(), Duration::from_secs(30))
            .await
            .unwrap();
        store.delete_keys("CACHED-CUBOID&1&0&0&*").await.unwrap();
        assert_eq!(store.get("CACHED-CUBOID&1&0&0&1").await.unwrap(), None);
        assert!(store.get("OTHER&1").await.unwrap().is_some());
    }
}
