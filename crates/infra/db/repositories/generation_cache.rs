use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use std::sync::Arc;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::{PgPoolSquad, with_connection},
    schema::generation_cache,
};
use domain::{
    entities::generation_cache::GenerationCacheEntity,
    repositories::result_cache::ResultCache, value_objects::generation::CachedOutput,
};

pub struct GenerationCachePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl GenerationCachePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ResultCache for GenerationCachePostgres {
    async fn get(&self, key: &str) -> Result<Option<CachedOutput>> {
        let key = key.to_string();

        with_connection(&self.db_pool, move |conn| {
            let entry = generation_cache::table
                .find(key)
                .select(GenerationCacheEntity::as_select())
                .first::<GenerationCacheEntity>(conn)
                .optional()?;

            Ok(entry.map(|entry| CachedOutput {
                text: entry.output,
                generator: entry.generator,
            }))
        })
        .await
    }

    async fn put(&self, key: &str, output: CachedOutput) -> Result<()> {
        let entry = GenerationCacheEntity {
            cache_key: key.to_string(),
            output: output.text,
            generator: output.generator,
            created_at: Utc::now(),
        };

        with_connection(&self.db_pool, move |conn| {
            insert_into(generation_cache::table)
                .values(&entry)
                .on_conflict(generation_cache::cache_key)
                .do_update()
                .set((
                    generation_cache::output.eq(excluded(generation_cache::output)),
                    generation_cache::generator.eq(excluded(generation_cache::generator)),
                    generation_cache::created_at.eq(excluded(generation_cache::created_at)),
                ))
                .execute(conn)?;

            Ok(())
        })
        .await
    }
}
