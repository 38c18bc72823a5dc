use std::{sync::Arc, time::Duration};

use crates::domain::{
    repositories::counter_store::CounterStore,
    value_objects::counters::{FailPolicy, ceil_seconds},
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleDecision {
    pub allowed: bool,
    pub retry_after_seconds: u64,
}

impl ThrottleDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_seconds: 0,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after_seconds: ceil_seconds(retry_after).max(1),
        }
    }
}

/// Fixed-window limiter keyed by client address. Runs before any auth or database work.
pub struct AbuseThrottle<C>
where
    C: CounterStore + Send + Sync + 'static,
{
    counters: Arc<C>,
    max_requests: u64,
    window: Duration,
    fail_policy: FailPolicy,
}

impl<C> AbuseThrottle<C>
where
    C: CounterStore + Send + Sync + 'static,
{
    pub fn new(counters: Arc<C>, max_requests: u64, window: Duration, fail_policy: FailPolicy) -> Self {
        Self {
            counters,
            max_requests,
            window,
            fail_policy,
        }
    }

    pub async fn allow(&self, client_id: &str) -> ThrottleDecision {
        let key = format!("throttle:{client_id}");

        match self.counters.hit_window(&key, self.window).await {
            Ok(hit) if hit.count <= self.max_requests => ThrottleDecision::allow(),
            Ok(hit) => {
                debug!(
                    client_id,
                    count = hit.count,
                    limit = self.max_requests,
                    "throttle: request denied"
                );
                ThrottleDecision::deny(hit.resets_in)
            }
            Err(err) if self.fail_policy.is_open() => {
                warn!(client_id, error = ?err, "throttle: counter store unavailable, failing open");
                ThrottleDecision::allow()
            }
            Err(err) => {
                warn!(client_id, error = ?err, "throttle: counter store unavailable, failing closed");
                ThrottleDecision::deny(self.window)
            }
        }
    }
}
