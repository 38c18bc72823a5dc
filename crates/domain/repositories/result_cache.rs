use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::generation::CachedOutput;

/// Fingerprint-keyed store of generated outputs. Entries never expire; `put` overwrites.
#[automock]
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedOutput>>;

    async fn put(&self, key: &str, output: CachedOutput) -> Result<()>;
}
