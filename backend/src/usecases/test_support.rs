use std::{collections::HashMap, sync::Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::accounts::{AccountEntity, BillingState, InsertAccountEntity},
    repositories::accounts::AccountRepository,
    value_objects::{
        accounts::{BillingUpdate, IdentityProfile},
        enums::plans::Plan,
    },
};
use uuid::Uuid;

/// In-memory `AccountRepository` with the same atomicity as the Postgres one.
#[derive(Default)]
pub struct FakeAccounts {
    rows: Mutex<HashMap<Uuid, AccountEntity>>,
}

impl FakeAccounts {
    pub fn with(accounts: Vec<AccountEntity>) -> Self {
        let fake = Self::default();
        {
            let mut rows = fake.rows.lock().unwrap();
            for account in accounts {
                rows.insert(account.id, account);
            }
        }
        fake
    }

    pub fn get(&self, account_id: Uuid) -> AccountEntity {
        self.rows.lock().unwrap().get(&account_id).cloned().unwrap()
    }

    fn update<F>(&self, account_id: Uuid, f: F) -> Result<AccountEntity>
    where
        F: FnOnce(&mut AccountEntity),
    {
        let mut rows = self.rows.lock().unwrap();
        let account = rows
            .get_mut(&account_id)
            .ok_or_else(|| anyhow!("account not found"))?;
        f(account);
        Ok(account.clone())
    }
}

pub fn sample_account(plan: Plan) -> AccountEntity {
    let now = Utc::now();
    AccountEntity {
        id: Uuid::new_v4(),
        email: Some("creator@example.com".to_string()),
        display_name: Some("Creator".to_string()),
        plan,
        email_verified: true,
        usage_count: 0,
        usage_limit_monthly: plan.default_usage_limit(),
        usage_reset_at: now + Duration::days(20),
        last_generation_at: None,
        billing: BillingState::default(),
        notified_billing_events: Vec::new(),
        created_at: now - Duration::days(40),
        updated_at: now - Duration::days(1),
    }
}

#[async_trait]
impl AccountRepository for FakeAccounts {
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountEntity>> {
        Ok(self.rows.lock().unwrap().get(&account_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountEntity>> {
        let email = email.to_ascii_lowercase();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|account| account.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn insert_if_absent(&self, account: InsertAccountEntity) -> Result<AccountEntity> {
        let mut rows = self.rows.lock().unwrap();
        let entry = rows.entry(account.id).or_insert_with(|| AccountEntity {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            plan: Plan::from_str(&account.plan).unwrap_or_default(),
            email_verified: account.email_verified,
            usage_count: account.usage_count,
            usage_limit_monthly: account.usage_limit_monthly,
            usage_reset_at: account.usage_reset_at,
            last_generation_at: None,
            billing: BillingState::default(),
            notified_billing_events: Vec::new(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        });
        Ok(entry.clone())
    }

    async fn sync_identity(
        &self,
        account_id: Uuid,
        identity: IdentityProfile,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity> {
        self.update(account_id, |account| {
            account.email = identity.email;
            account.display_name = identity.display_name;
            account.email_verified = identity.email_verified;
            account.updated_at = now;
        })
    }

    async fn reset_usage_if_due(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        next_reset_at: DateTime<Utc>,
    ) -> Result<AccountEntity> {
        self.update(account_id, |account| {
            if account.usage_reset_at <= now {
                account.usage_count = 0;
                account.usage_reset_at = next_reset_at;
                account.updated_at = now;
            }
        })
    }

    async fn increment_usage(
        &self,
        account_id: Uuid,
        limit: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountEntity>> {
        let mut counted = false;
        let account = self.update(account_id, |account| {
            if account.usage_count < limit {
                account.usage_count += 1;
                account.last_generation_at = Some(now);
                account.updated_at = now;
                counted = true;
            }
        })?;
        Ok(counted.then_some(account))
    }

    async fn apply_billing_update(
        &self,
        account_id: Uuid,
        update: BillingUpdate,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity> {
        self.update(account_id, |account| {
            account.plan = update.plan;
            account.usage_limit_monthly = update.usage_limit_monthly;
            account.billing.status = Some(update.status);
            account.billing.plan_expires_at = update.plan_expires_at;
            if update.customer_id.is_some() {
                account.billing.customer_id = update.customer_id;
            }
            if update.subscription_id.is_some() {
                account.billing.subscription_id = update.subscription_id;
            }
            account.updated_at = now;
        })
    }

    async fn record_notified_event(
        &self,
        account_id: Uuid,
        event_id: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.update(account_id, |account| {
            if !account.has_notified(&event_id) {
                account.notified_billing_events.push(event_id);
            }
            let overflow = account.notified_billing_events.len().saturating_sub(20);
            account.notified_billing_events.drain(..overflow);
            account.updated_at = now;
        })?;
        Ok(())
    }

    async fn clear_billing(
        &self,
        account_id: Uuid,
        free_usage_limit: i32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.update(account_id, |account| {
            account.plan = Plan::Free;
            account.usage_limit_monthly = free_usage_limit;
            account.billing = BillingState::default();
            account.updated_at = now;
        })?;
        Ok(())
    }
}
