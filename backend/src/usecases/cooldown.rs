use std::{sync::Arc, time::Duration};

use crates::domain::{
    repositories::counter_store::CounterStore,
    value_objects::counters::{ClaimOutcome, FailPolicy, ceil_seconds},
};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownDecision {
    pub allowed: bool,
    pub seconds_remaining: u64,
}

/// Minimum spacing between one account's generations.
///
/// `check` claims the account's slot atomically for one request, identified by `owner`. The claim
/// is released when that request fails later on and re-armed from completion time when it
/// succeeds. A release never frees a slot another request claimed in the meantime. The monthly
/// limit does not rely on this gate; `QuotaTracker::increment` enforces it on its own.
pub struct CooldownTracker<C>
where
    C: CounterStore + Send + Sync + 'static,
{
    counters: Arc<C>,
    paid: Duration,
    free: Duration,
    fail_policy: FailPolicy,
}

impl<C> CooldownTracker<C>
where
    C: CounterStore + Send + Sync + 'static,
{
    pub fn new(counters: Arc<C>, paid: Duration, free: Duration, fail_policy: FailPolicy) -> Self {
        Self {
            counters,
            paid,
            free,
            fail_policy,
        }
    }

    fn key(account_id: Uuid) -> String {
        format!("cooldown:{account_id}")
    }

    fn spacing(&self, is_paid: bool) -> Duration {
        if is_paid { self.paid } else { self.free }
    }

    pub async fn check(&self, account_id: Uuid, owner: &str, is_paid: bool) -> CooldownDecision {
        let spacing = self.spacing(is_paid);
        if spacing.is_zero() {
            return CooldownDecision {
                allowed: true,
                seconds_remaining: 0,
            };
        }

        match self.counters.claim(&Self::key(account_id), owner, spacing).await {
            Ok(ClaimOutcome::Claimed) => CooldownDecision {
                allowed: true,
                seconds_remaining: 0,
            },
            Ok(ClaimOutcome::Held { remaining }) => {
                debug!(%account_id, "cooldown: request inside cooldown window");
                CooldownDecision {
                    allowed: false,
                    seconds_remaining: ceil_seconds(remaining).max(1),
                }
            }
            Err(err) if self.fail_policy.is_open() => {
                warn!(%account_id, error = ?err, "cooldown: counter store unavailable, failing open");
                CooldownDecision {
                    allowed: true,
                    seconds_remaining: 0,
                }
            }
            Err(err) => {
                warn!(%account_id, error = ?err, "cooldown: counter store unavailable, failing closed");
                CooldownDecision {
                    allowed: false,
                    seconds_remaining: ceil_seconds(spacing),
                }
            }
        }
    }

    /// Restarts the window from now; called once the generation completed.
    pub async fn arm(&self, account_id: Uuid, owner: &str, is_paid: bool) {
        let spacing = self.spacing(is_paid);
        if spacing.is_zero() {
            return;
        }

        if let Err(err) = self.counters.hold(&Self::key(account_id), owner, spacing).await {
            warn!(%account_id, error = ?err, "cooldown: failed to re-arm after generation");
        }
    }

    /// Gives the slot back after a request that did not complete.
    pub async fn release(&self, account_id: Uuid, owner: &str, is_paid: bool) {
        if self.spacing(is_paid).is_zero() {
            return;
        }

        if let Err(err) = self.counters.release(&Self::key(account_id), owner).await {
            warn!(%account_id, error = ?err, "cooldown: failed to release claim");
        }
    }
}
