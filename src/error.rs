//! Error taxonomy. Each subsystem gets its own [`thiserror::Error`] enum
//! (matching the way `pageserver::tenant` defines `GetTimelineError`,
//! `CreateTimelineError`, etc. rather than a single crate-wide error type),
//! and the facade boundary converts everything into [`SpdbError`], whose
//! variants carry the stable numeric codes from the spec's error surface.

use thiserror::Error;

/// Failures from the object store (cold, content-addressed blob storage).
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object store I/O error: {0}")]
    Io(#[source] anyhow::Error),
}

/// Failures from the cache store (hot, TTL'd byte store).
#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Failures from the state store adapter (lists, sets, pub/sub, transactions).
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state store error: {0}")]
    Backend(#[source] anyhow::Error),
    #[error("watched key changed before transaction could commit")]
    WatchConflict,
}

/// Failures from the page-in coordinator's wait loop.
#[derive(Debug, Error)]
pub enum PageInError {
    #[error("timed out after {0:?} waiting for page-in completion")]
    Timeout(std::time::Duration),
    #[error("received a message on the wrong pub/sub channel: expected {expected}, got {got}")]
    WrongChannel { expected: String, got: String },
    #[error(transparent)]
    StateStore(#[from] StateStoreError),
}

/// Failures returned by [`crate::page_out::PageOutTracker`] when the
/// bounded retry cap on a watched transaction is exceeded.
#[derive(Debug, Error)]
pub enum PageOutError {
    #[error("exceeded {0} attempts retrying a watched page-out transaction")]
    RetryLimitExceeded(u32),
    #[error(transparent)]
    StateStore(#[from] StateStoreError),
}

/// The stable, codeable error surface the facade presents to its callers
/// (spec.md §7). Codes are illustrative, matching the original ordering.
#[derive(Debug, Error)]
pub enum SpdbError {
    #[error("[1000] unexpected spdb error: {0}")]
    Generic(#[source] anyhow::Error),

    #[error("[1001] operation not supported for this channel/layer's datatype")]
    DatatypeNotSupported,

    #[error("[1003] object store I/O error: {0}")]
    Io(#[from] ObjectStoreError),

    #[error("[1004] state/cache store error: {0}")]
    StateStore(#[source] anyhow::Error),

    #[error("async paging error: {0}")]
    Async(#[from] PageInError),

    #[error("channel is write-locked after a prior unrecoverable flush failure")]
    ChannelLocked,
}

impl From<CacheStoreError> for SpdbError {
    fn from(e: CacheStoreError) -> Self {
        match e {
            CacheStoreError::Backend(err) => SpdbError::StateStore(err),
        }
    }
}

impl From<StateStoreError> for SpdbError {
    fn from(e: StateStoreError) -> Self {
        match e {
            StateStoreError::Backend(err) => SpdbError::StateStore(err),
            StateStoreError::WatchConflict => {
                SpdbError::StateStore(anyhow::anyhow!("watch conflict"))
            }
        }
    }
}

impl From<PageOutError> for SpdbError {
    fn from(e: PageOutError) -> Self {
        match e {
            PageOutError::RetryLimitExceeded(n) => {
                SpdbError::StateStore(anyhow::anyhow!("page-out retry limit ({n}) exceeded"))
            }
            PageOutError::StateStore(inner) => inner.into(),
        }
    }
}
