use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::{PgPoolSquad, with_connection},
    schema::generation_jobs,
};
use domain::{
    entities::generation_jobs::{GenerationJobEntity, InsertGenerationJobEntity},
    repositories::generation_jobs::GenerationJobRepository,
};

pub struct GenerationJobPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl GenerationJobPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl GenerationJobRepository for GenerationJobPostgres {
    async fn insert(&self, job: InsertGenerationJobEntity) -> Result<Uuid> {
        with_connection(&self.db_pool, move |conn| {
            let id = insert_into(generation_jobs::table)
                .values(&job)
                .returning(generation_jobs::id)
                .get_result::<Uuid>(conn)?;

            Ok(id)
        })
        .await
    }

    async fn list_recent(&self, account_id: Uuid, limit: i64) -> Result<Vec<GenerationJobEntity>> {
        with_connection(&self.db_pool, move |conn| {
            let rows = generation_jobs::table
                .filter(generation_jobs::account_id.eq(account_id))
                .order(generation_jobs::created_at.desc())
                .limit(limit)
                .select(GenerationJobEntity::as_select())
                .load::<GenerationJobEntity>(conn)?;

            Ok(rows)
        })
        .await
    }
}
