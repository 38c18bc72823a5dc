pub mod in_memory;
pub mod redis_store;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    repositories::counter_store::CounterStore,
    value_objects::counters::{ClaimOutcome, WindowHit},
};

/// Counter store selected at startup: Redis when configured, process memory otherwise.
pub enum CounterBackend {
    InMemory(in_memory::InMemoryCounterStore),
    Redis(redis_store::RedisCounterStore),
}

impl CounterBackend {
    pub fn name(&self) -> &'static str {
        match self {
            CounterBackend::InMemory(_) => "in_memory",
            CounterBackend::Redis(_) => "redis",
        }
    }
}

#[async_trait]
impl CounterStore for CounterBackend {
    async fn hit_window(&self, key: &str, window: Duration) -> Result<WindowHit> {
        match self {
            CounterBackend::InMemory(store) => store.hit_window(key, window).await,
            CounterBackend::Redis(store) => store.hit_window(key, window).await,
        }
    }

    async fn claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<ClaimOutcome> {
        match self {
            CounterBackend::InMemory(store) => store.claim(key, owner, ttl).await,
            CounterBackend::Redis(store) => store.claim(key, owner, ttl).await,
        }
    }

    async fn hold(&self, key: &str, owner: &str, ttl: Duration) -> Result<()> {
        match self {
            CounterBackend::InMemory(store) => store.hold(key, owner, ttl).await,
            CounterBackend::Redis(store) => store.hold(key, owner, ttl).await,
        }
    }

    async fn release(&self, key: &str, owner: &str) -> Result<()> {
        match self {
            CounterBackend::InMemory(store) => store.release(key, owner).await,
            CounterBackend::Redis(store) => store.release(key, owner).await,
        }
    }
}
