use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::generation_cache;

#[derive(Debug, Clone, Selectable, Queryable, Insertable)]
#[diesel(table_name = generation_cache)]
pub struct GenerationCacheEntity {
    pub cache_key: String,
    pub output: String,
    pub generator: String,
    pub created_at: DateTime<Utc>,
}
