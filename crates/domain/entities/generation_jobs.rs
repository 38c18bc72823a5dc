use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::generation_jobs;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = generation_jobs)]
pub struct GenerationJobEntity {
    pub id: Uuid,
    pub account_id: Uuid,
    pub input_type: String,
    pub input_text: String,
    pub source_url: Option<String>,
    pub formats: Vec<String>,
    pub context: serde_json::Value,
    pub outputs: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = generation_jobs)]
pub struct InsertGenerationJobEntity {
    pub account_id: Uuid,
    pub input_type: String,
    pub input_text: String,
    pub source_url: Option<String>,
    pub formats: Vec<String>,
    pub context: serde_json::Value,
    pub outputs: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
