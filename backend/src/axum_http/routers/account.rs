use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use crates::{
    domain::repositories::{accounts::AccountRepository, generation_jobs::GenerationJobRepository},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{accounts::AccountPostgres, generation_jobs::GenerationJobPostgres},
    },
};
use serde::Deserialize;

use crate::{
    auth::Credential,
    config::config_model::DotEnvyConfig,
    usecases::{account::AccountUseCase, identity::IdentityResolver, quota::QuotaTracker},
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let accounts = Arc::new(AccountPostgres::new(Arc::clone(&db_pool)));
    let jobs = Arc::new(GenerationJobPostgres::new(Arc::clone(&db_pool)));
    let usecase = AccountUseCase::new(
        IdentityResolver::new(
            Arc::clone(&accounts),
            config.supabase.jwt_secret.clone(),
            config.plans.free_usage_limit,
        ),
        QuotaTracker::new(Arc::clone(&accounts), config.plans.free_usage_limit),
        accounts,
        jobs,
    );

    Router::new()
        .route("/account", get(view).delete(soft_delete))
        .route("/history", get(history))
        .with_state(Arc::new(usecase))
}

pub async fn view<A, J>(
    State(usecase): State<Arc<AccountUseCase<A, J>>>,
    credential: Credential,
) -> Response
where
    A: AccountRepository + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
{
    match usecase.view(credential.token()).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn soft_delete<A, J>(
    State(usecase): State<Arc<AccountUseCase<A, J>>>,
    credential: Credential,
) -> Response
where
    A: AccountRepository + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
{
    match usecase.soft_delete(credential.token()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn history<A, J>(
    State(usecase): State<Arc<AccountUseCase<A, J>>>,
    credential: Credential,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    A: AccountRepository + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
{
    match usecase.history(credential.token(), query.limit).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => err.into_response(),
    }
}
