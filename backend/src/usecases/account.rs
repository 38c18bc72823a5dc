use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::generation_jobs::GenerationJobEntity,
    repositories::{accounts::AccountRepository, generation_jobs::GenerationJobRepository},
    value_objects::accounts::AccountView,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::usecases::{
    entitlements::is_paid,
    identity::IdentityResolver,
    quota::QuotaTracker,
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("authentication required")]
    Unauthenticated,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccountError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AccountError::Unauthenticated => "unauthenticated",
            AccountError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub input_type: String,
    pub source_url: Option<String>,
    pub formats: Vec<String>,
    pub outputs: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<GenerationJobEntity> for HistoryItem {
    fn from(value: GenerationJobEntity) -> Self {
        Self {
            id: value.id,
            input_type: value.input_type,
            source_url: value.source_url,
            formats: value.formats,
            outputs: value.outputs,
            created_at: value.created_at,
        }
    }
}

pub struct AccountUseCase<A, J>
where
    A: AccountRepository + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
{
    identity: IdentityResolver<A>,
    quota: QuotaTracker<A>,
    accounts: Arc<A>,
    jobs: Arc<J>,
}

impl<A, J> AccountUseCase<A, J>
where
    A: AccountRepository + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
{
    pub fn new(
        identity: IdentityResolver<A>,
        quota: QuotaTracker<A>,
        accounts: Arc<A>,
        jobs: Arc<J>,
    ) -> Self {
        Self {
            identity,
            quota,
            accounts,
            jobs,
        }
    }

    /// Read model for the dashboard. A due monthly reset is applied before projecting.
    pub async fn view(&self, credential: Option<&str>) -> Result<AccountView, AccountError> {
        let now = Utc::now();
        let mut account = self
            .identity
            .resolve(credential, now)
            .await
            .map_err(|_| AccountError::Unauthenticated)?;

        let usage = self.quota.check_and_reset(&account, now).await?;
        account.usage_count = usage.usage_count;
        account.usage_limit_monthly = usage.usage_limit_monthly;
        account.usage_reset_at = usage.usage_reset_at;

        Ok(AccountView::project(&account, is_paid(&account, now)))
    }

    /// Clears billing fields and drops the account to the free plan. The row and its usage
    /// history stay.
    pub async fn soft_delete(&self, credential: Option<&str>) -> Result<(), AccountError> {
        let now = Utc::now();
        let account = self
            .identity
            .resolve(credential, now)
            .await
            .map_err(|_| AccountError::Unauthenticated)?;

        self.accounts
            .clear_billing(account.id, self.quota.free_usage_limit(), now)
            .await?;
        info!(account_id = %account.id, "account: billing fields cleared, plan set to free");
        Ok(())
    }

    pub async fn history(
        &self,
        credential: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryItem>, AccountError> {
        let now = Utc::now();
        let account = self
            .identity
            .resolve(credential, now)
            .await
            .map_err(|_| AccountError::Unauthenticated)?;

        if !is_paid(&account, now) {
            return Ok(Vec::new());
        }

        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let jobs = self
            .jobs
            .list_recent(account.id, limit)
            .await
            .inspect_err(|err| {
                error!(account_id = %account.id, db_error = ?err, "account: failed to list history")
            })?;

        Ok(jobs.into_iter().map(HistoryItem::from).collect())
    }
}
