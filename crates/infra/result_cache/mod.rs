pub mod in_memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    domain::{repositories::result_cache::ResultCache, value_objects::generation::CachedOutput},
    infra::db::repositories::generation_cache::GenerationCachePostgres,
};

/// Result cache selected at startup by `RESULT_CACHE_STORE`.
pub enum ResultCacheBackend {
    Postgres(GenerationCachePostgres),
    InMemory(in_memory::InMemoryResultCache),
}

#[async_trait]
impl ResultCache for ResultCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<CachedOutput>> {
        match self {
            ResultCacheBackend::Postgres(cache) => cache.get(key).await,
            ResultCacheBackend::InMemory(cache) => cache.get(key).await,
        }
    }

    async fn put(&self, key: &str, output: CachedOutput) -> Result<()> {
        match self {
            ResultCacheBackend::Postgres(cache) => cache.put(key, output).await,
            ResultCacheBackend::InMemory(cache) => cache.put(key, output).await,
        }
    }
}
