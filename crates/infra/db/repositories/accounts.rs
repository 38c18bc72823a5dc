use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::{PgPoolSquad, with_connection},
    schema::accounts,
};
use domain::{
    entities::accounts::{AccountEntity, AccountRow, IdentityChangeset, InsertAccountEntity},
    repositories::accounts::AccountRepository,
    value_objects::{
        accounts::{BillingUpdate, IdentityProfile},
        enums::plans::Plan,
    },
};

/// Number of notified billing event ids remembered per account.
pub const NOTIFIED_EVENTS_KEPT: usize = 20;

pub struct AccountPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AccountPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn load_row(conn: &mut PgConnection, account_id: Uuid) -> Result<AccountEntity> {
    let row = accounts::table
        .find(account_id)
        .select(AccountRow::as_select())
        .first::<AccountRow>(conn)?;

    Ok(row.into())
}

#[async_trait]
impl AccountRepository for AccountPostgres {
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountEntity>> {
        with_connection(&self.db_pool, move |conn| {
            let row = accounts::table
                .find(account_id)
                .select(AccountRow::as_select())
                .first::<AccountRow>(conn)
                .optional()?;

            Ok(row.map(AccountEntity::from))
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountEntity>> {
        let email = email.trim().to_ascii_lowercase();

        with_connection(&self.db_pool, move |conn| {
            let row = accounts::table
                .filter(accounts::email.eq(email))
                .order(accounts::created_at.asc())
                .select(AccountRow::as_select())
                .first::<AccountRow>(conn)
                .optional()?;

            Ok(row.map(AccountEntity::from))
        })
        .await
    }

    async fn insert_if_absent(&self, account: InsertAccountEntity) -> Result<AccountEntity> {
        with_connection(&self.db_pool, move |conn| {
            insert_into(accounts::table)
                .values(&account)
                .on_conflict(accounts::id)
                .do_nothing()
                .execute(conn)?;

            load_row(conn, account.id)
        })
        .await
    }

    async fn sync_identity(
        &self,
        account_id: Uuid,
        identity: IdentityProfile,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity> {
        let changeset = IdentityChangeset {
            email: identity.email.map(|email| email.to_ascii_lowercase()),
            display_name: identity.display_name,
            email_verified: identity.email_verified,
            updated_at: now,
        };

        with_connection(&self.db_pool, move |conn| {
            let row = update(accounts::table.find(account_id))
                .set(&changeset)
                .returning(AccountRow::as_returning())
                .get_result::<AccountRow>(conn)?;

            Ok(row.into())
        })
        .await
    }

    async fn reset_usage_if_due(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        next_reset_at: DateTime<Utc>,
    ) -> Result<AccountEntity> {
        with_connection(&self.db_pool, move |conn| {
            // The `usage_reset_at <= now` guard makes concurrent resets collapse into one.
            update(
                accounts::table
                    .filter(accounts::id.eq(account_id))
                    .filter(accounts::usage_reset_at.le(now)),
            )
            .set((
                accounts::usage_count.eq(0),
                accounts::usage_reset_at.eq(next_reset_at),
                accounts::updated_at.eq(now),
            ))
            .execute(conn)?;

            load_row(conn, account_id)
        })
        .await
    }

    async fn increment_usage(
        &self,
        account_id: Uuid,
        limit: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountEntity>> {
        with_connection(&self.db_pool, move |conn| {
            // Check and increment in one statement; zero rows means the quota is spent.
            let row = update(
                accounts::table
                    .filter(accounts::id.eq(account_id))
                    .filter(accounts::usage_count.lt(limit)),
            )
            .set((
                accounts::usage_count.eq(accounts::usage_count + 1),
                accounts::last_generation_at.eq(Some(now)),
                accounts::updated_at.eq(now),
            ))
            .returning(AccountRow::as_returning())
            .get_result::<AccountRow>(conn)
            .optional()?;

            Ok(row.map(AccountEntity::from))
        })
        .await
    }

    async fn apply_billing_update(
        &self,
        account_id: Uuid,
        update_model: BillingUpdate,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity> {
        let changeset = update_model.into_changeset(now);

        with_connection(&self.db_pool, move |conn| {
            let row = update(accounts::table.find(account_id))
                .set(&changeset)
                .returning(AccountRow::as_returning())
                .get_result::<AccountRow>(conn)?;

            Ok(row.into())
        })
        .await
    }

    async fn record_notified_event(
        &self,
        account_id: Uuid,
        event_id: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        with_connection(&self.db_pool, move |conn| {
            conn.transaction::<(), anyhow::Error, _>(|tx| {
                let mut events = accounts::table
                    .find(account_id)
                    .select(accounts::notified_billing_events)
                    .for_update()
                    .first::<Vec<String>>(tx)?;

                if events.iter().any(|existing| existing == &event_id) {
                    return Ok(());
                }

                events.push(event_id);
                if events.len() > NOTIFIED_EVENTS_KEPT {
                    let overflow = events.len() - NOTIFIED_EVENTS_KEPT;
                    events.drain(..overflow);
                }

                update(accounts::table.find(account_id))
                    .set((
                        accounts::notified_billing_events.eq(events),
                        accounts::updated_at.eq(now),
                    ))
                    .execute(tx)?;

                Ok(())
            })
        })
        .await
    }

    async fn clear_billing(
        &self,
        account_id: Uuid,
        free_usage_limit: i32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        with_connection(&self.db_pool, move |conn| {
            update(accounts::table.find(account_id))
                .set((
                    accounts::plan.eq(Plan::Free.to_string()),
                    accounts::usage_limit_monthly.eq(free_usage_limit),
                    accounts::billing_customer_id.eq(None::<String>),
                    accounts::billing_subscription_id.eq(None::<String>),
                    accounts::billing_status.eq(None::<String>),
                    accounts::plan_expires_at.eq(None::<DateTime<Utc>>),
                    accounts::updated_at.eq(now),
                ))
                .execute(conn)?;

            Ok(())
        })
        .await
    }
}
