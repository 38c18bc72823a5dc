use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{
    repositories::result_cache::ResultCache, value_objects::generation::CachedOutput,
};

/// Result cache that lives as long as the process; entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultCache {
    entries: Arc<DashMap<String, CachedOutput>>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Result<Option<CachedOutput>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, output: CachedOutput) -> Result<()> {
        self.entries.insert(key.to_string(), output);
        Ok(())
    }
}
