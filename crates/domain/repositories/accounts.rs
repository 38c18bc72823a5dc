use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::accounts::{AccountEntity, InsertAccountEntity},
    value_objects::accounts::{BillingUpdate, IdentityProfile},
};

#[automock]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountEntity>>;

    /// Case-insensitive lookup; emails are stored lowercased.
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountEntity>>;

    /// Inserts the account unless a row with the same id exists, then returns the stored row.
    async fn insert_if_absent(&self, account: InsertAccountEntity) -> Result<AccountEntity>;

    async fn sync_identity(
        &self,
        account_id: Uuid,
        identity: IdentityProfile,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity>;

    /// Zeroes the usage counter and moves the reset instant, only if the reset is due at `now`.
    async fn reset_usage_if_due(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        next_reset_at: DateTime<Utc>,
    ) -> Result<AccountEntity>;

    /// Atomic `usage_count + 1` guarded by `usage_count < limit`; also stamps `last_generation_at`.
    /// `None` when the counter already reached `limit`.
    async fn increment_usage(
        &self,
        account_id: Uuid,
        limit: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountEntity>>;

    async fn apply_billing_update(
        &self,
        account_id: Uuid,
        update: BillingUpdate,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity>;

    async fn record_notified_event(
        &self,
        account_id: Uuid,
        event_id: String,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Soft delete: billing fields are cleared and the plan drops to free, the row itself stays.
    async fn clear_billing(
        &self,
        account_id: Uuid,
        free_usage_limit: i32,
        now: DateTime<Utc>,
    ) -> Result<()>;
}
