use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::counters::{ClaimOutcome, WindowHit};

/// Ephemeral counters for throttling and cooldowns. Losing them on restart is acceptable.
#[automock]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Counts one hit in the fixed window opened by the first hit on `key`.
    async fn hit_window(&self, key: &str, window: Duration) -> Result<WindowHit>;

    /// Takes `key` for `owner` during `ttl` unless someone already holds it.
    async fn claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<ClaimOutcome>;

    /// Takes `key` for `owner` during `ttl` unconditionally, replacing any remaining time.
    async fn hold(&self, key: &str, owner: &str, ttl: Duration) -> Result<()>;

    /// Frees `key` only while `owner` still holds it.
    async fn release(&self, key: &str, owner: &str) -> Result<()>;
}
