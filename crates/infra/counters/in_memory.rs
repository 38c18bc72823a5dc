use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{
    repositories::counter_store::CounterStore,
    value_objects::counters::{ClaimOutcome, WindowHit},
};

#[derive(Debug, Clone)]
struct Slot {
    count: u64,
    expires_at: Instant,
    /// Set for claims; window counters have no owner.
    owner: Option<String>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local counter store for single-instance deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounterStore {
    slots: Arc<DashMap<String, Slot>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired slots so idle keys do not accumulate.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live(now));
        let purged = before.saturating_sub(self.slots.len());
        if purged > 0 {
            debug!(purged, "counters: purged expired in-memory slots");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hit_window(&self, key: &str, window: Duration) -> Result<WindowHit> {
        let now = Instant::now();
        let mut slot = self.slots.entry(key.to_string()).or_insert(Slot {
            count: 0,
            expires_at: now + window,
            owner: None,
        });

        if !slot.is_live(now) {
            slot.count = 0;
            slot.expires_at = now + window;
        }
        slot.count += 1;

        Ok(WindowHit {
            count: slot.count,
            resets_in: slot.expires_at.saturating_duration_since(now),
        })
    }

    async fn claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<ClaimOutcome> {
        let now = Instant::now();
        let mut slot = self.slots.entry(key.to_string()).or_insert(Slot {
            count: 0,
            expires_at: now,
            owner: None,
        });

        if slot.is_live(now) {
            return Ok(ClaimOutcome::Held {
                remaining: slot.expires_at.saturating_duration_since(now),
            });
        }

        slot.count = 1;
        slot.expires_at = now + ttl;
        slot.owner = Some(owner.to_string());
        Ok(ClaimOutcome::Claimed)
    }

    async fn hold(&self, key: &str, owner: &str, ttl: Duration) -> Result<()> {
        self.slots.insert(
            key.to_string(),
            Slot {
                count: 1,
                expires_at: Instant::now() + ttl,
                owner: Some(owner.to_string()),
            },
        );
        Ok(())
    }

    async fn release(&self, key: &str, owner: &str) -> Result<()> {
        self.slots
            .remove_if(key, |_, slot| slot.owner.as_deref() == Some(owner));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn window_counts_hits_until_it_expires() {
        tokio::time::pause();
        let store = InMemoryCounterStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.hit_window("ip:1", window).await.unwrap().count, 1);
        assert_eq!(store.hit_window("ip:1", window).await.unwrap().count, 2);
        assert_eq!(store.hit_window("ip:2", window).await.unwrap().count, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let hit = store.hit_window("ip:1", window).await.unwrap();
        assert_eq!(hit.count, 1);
        assert_eq!(hit.resets_in, window);
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        tokio::time::pause();
        let store = InMemoryCounterStore::new();
        let ttl = Duration::from_secs(30);

        assert_eq!(
            store.claim("cd:a", "req-1", ttl).await.unwrap(),
            ClaimOutcome::Claimed
        );
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(
            store.claim("cd:a", "req-2", ttl).await.unwrap(),
            ClaimOutcome::Held {
                remaining: Duration::from_secs(20)
            }
        );

        store.release("cd:a", "req-1").await.unwrap();
        assert_eq!(
            store.claim("cd:a", "req-2", ttl).await.unwrap(),
            ClaimOutcome::Claimed
        );
    }

    #[tokio::test]
    async fn release_leaves_a_newer_claim_alone() {
        tokio::time::pause();
        let store = InMemoryCounterStore::new();
        let ttl = Duration::from_secs(30);

        store.claim("cd:c", "req-1", ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            store.claim("cd:c", "req-2", ttl).await.unwrap(),
            ClaimOutcome::Claimed
        );

        // The first request fails late, after its own claim lapsed.
        store.release("cd:c", "req-1").await.unwrap();
        assert!(matches!(
            store.claim("cd:c", "req-3", ttl).await.unwrap(),
            ClaimOutcome::Held { .. }
        ));
    }

    #[tokio::test]
    async fn hold_replaces_remaining_time() {
        tokio::time::pause();
        let store = InMemoryCounterStore::new();

        store.claim("cd:b", "req-1", Duration::from_secs(5)).await.unwrap();
        store.hold("cd:b", "req-1", Duration::from_secs(45)).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(
            store.claim("cd:b", "req-2", Duration::from_secs(5)).await.unwrap(),
            ClaimOutcome::Held {
                remaining: Duration::from_secs(35)
            }
        );
    }

    #[tokio::test]
    async fn purge_drops_expired_slots() {
        tokio::time::pause();
        let store = InMemoryCounterStore::new();
        store.hit_window("ip:1", Duration::from_secs(1)).await.unwrap();
        store.hold("cd:1", "req-1", Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
