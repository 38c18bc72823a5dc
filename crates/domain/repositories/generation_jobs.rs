use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::generation_jobs::{GenerationJobEntity, InsertGenerationJobEntity};

#[automock]
#[async_trait]
pub trait GenerationJobRepository: Send + Sync {
    async fn insert(&self, job: InsertGenerationJobEntity) -> Result<Uuid>;

    async fn list_recent(&self, account_id: Uuid, limit: i64) -> Result<Vec<GenerationJobEntity>>;
}
