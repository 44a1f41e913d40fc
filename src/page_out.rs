//! Decides, when a write arrives for `(lookup, res, t, morton)`, whether an
//! earlier write for the same tuple is still in flight to object storage.
//!
//! Grounded on `state.py::add_to_page_out`/`in_page_out`, with the retry cap
//! generalized into configuration and given exponential backoff with jitter
//! per spec.md §4.6's design note ("the 200-iteration cap ... is a defensive
//! upper bound, not a correctness requirement").

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{instrument, warn};

use crate::error::{PageOutError, StateStoreError};
use crate::key_codec::{page_out_key, page_out_member, parse_write_cuboid_key, CuboidAddress};
use crate::state_store::StateStore;

/// How long the scratch set used by `claim_page_out` lives before Redis
/// reaps it, per spec.md §4.6 ("≈15 s").
const SCRATCH_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 200,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
        }
    }
}

pub struct PageOutTracker<S: StateStore + ?Sized> {
    state_store: Arc<S>,
    retry_policy: RetryPolicy,
}

impl<S: StateStore + ?Sized> PageOutTracker<S> {
    pub fn new(state_store: Arc<S>) -> Self {
        Self {
            state_store,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(state_store: Arc<S>, retry_policy: RetryPolicy) -> Self {
        Self {
            state_store,
            retry_policy,
        }
    }

    /// Claims the flush for `addr`, or reports that another writer already
    /// owns it. `temp_key` is a scratch set name unique to this call (the
    /// caller mints a fresh one per attempt, typically from the write's own
    /// uuid).
    ///
    /// Returns `in_page_out = false` if this caller now owns the flush,
    /// `true` if another writer's flush is already in flight and this write
    /// must be delayed.
    #[instrument(skip(self), fields(lookup = %addr.lookup_key, res = addr.resolution, t = addr.time_sample, morton = addr.morton))]
    pub async fn add_to_page_out(
        &self,
        temp_key: &str,
        addr: &CuboidAddress,
    ) -> Result<bool, PageOutError> {
        let page_out_key = page_out_key(&addr.lookup_key, addr.resolution);
        let member = page_out_member(addr.time_sample, addr.morton);

        for attempt in 0..self.retry_policy.max_attempts {
            match self
                .state_store
                .claim_page_out(temp_key, &page_out_key, &member, SCRATCH_TTL)
                .await?
            {
                Some(already_in_page_out) => return Ok(already_in_page_out),
                None => {
                    warn!(attempt, "page-out watch conflict, retrying");
                    tokio::time::sleep(self.backoff_for(attempt)).await;
                }
            }
        }

        Err(PageOutError::RetryLimitExceeded(self.retry_policy.max_attempts))
    }

    /// Read-only variant: reports membership without claiming ownership.
    pub async fn in_page_out(
        &self,
        temp_key: &str,
        addr: &CuboidAddress,
    ) -> Result<bool, StateStoreError> {
        let page_out_key = page_out_key(&addr.lookup_key, addr.resolution);
        let member = page_out_member(addr.time_sample, addr.morton);
        self.state_store
            .check_page_out(temp_key, &page_out_key, &member, SCRATCH_TTL)
            .await
    }

    /// After a successful object-store put, remove the tuple from the
    /// page-out set, deriving the fields by parsing the write-cuboid key.
    pub async fn remove_from_page_out(&self, write_cuboid_key: &str) -> Result<(), StateStoreError> {
        let (addr, _uuid) = parse_write_cuboid_key(write_cuboid_key);
        let page_out_key = page_out_key(&addr.lookup_key, addr.resolution);
        let member = page_out_member(addr.time_sample, addr.morton);
        self.state_store.set_remove(&page_out_key, &member).await
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .retry_policy
            .base_backoff
            .saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX))
            .min(self.retry_policy.max_backoff);
        let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64);
        Duration::from_millis(jitter_ms)
    }
}
