use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{plans::Plan, subscription_statuses::SubscriptionStatus},
    infra::db::postgres::schema::accounts,
};

/// Account with every optional or legacy column already defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub plan: Plan,
    pub email_verified: bool,
    pub usage_count: i32,
    pub usage_limit_monthly: i32,
    pub usage_reset_at: DateTime<Utc>,
    pub last_generation_at: Option<DateTime<Utc>>,
    pub billing: BillingState,
    pub notified_billing_events: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing-provider fields. All of them are absent for accounts that never checked out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillingState {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub plan_expires_at: Option<DateTime<Utc>>,
}

impl AccountEntity {
    pub fn has_notified(&self, event_id: &str) -> bool {
        self.notified_billing_events
            .iter()
            .any(|existing| existing == event_id)
    }
}

/// Raw row used for Diesel queries. Converted into `AccountEntity` right after loading.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = accounts)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub plan: String,
    pub email_verified: bool,
    pub usage_count: i32,
    pub usage_limit_monthly: i32,
    pub usage_reset_at: DateTime<Utc>,
    pub last_generation_at: Option<DateTime<Utc>>,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub billing_status: Option<String>,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub notified_billing_events: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountRow> for AccountEntity {
    fn from(value: AccountRow) -> Self {
        let plan = Plan::from_str(&value.plan).unwrap_or_default();
        let usage_limit_monthly = if value.usage_limit_monthly > 0 {
            value.usage_limit_monthly
        } else {
            plan.default_usage_limit()
        };

        Self {
            id: value.id,
            email: non_empty(value.email),
            display_name: non_empty(value.display_name),
            plan,
            email_verified: value.email_verified,
            usage_count: value.usage_count.max(0),
            usage_limit_monthly,
            usage_reset_at: value.usage_reset_at,
            last_generation_at: value.last_generation_at,
            billing: BillingState {
                customer_id: non_empty(value.billing_customer_id),
                subscription_id: non_empty(value.billing_subscription_id),
                status: value
                    .billing_status
                    .as_deref()
                    .and_then(SubscriptionStatus::from_str),
                plan_expires_at: value.plan_expires_at,
            },
            notified_billing_events: value.notified_billing_events,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = accounts)]
pub struct InsertAccountEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub plan: String,
    pub email_verified: bool,
    pub usage_count: i32,
    pub usage_limit_monthly: i32,
    pub usage_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity-provider fields kept in sync on every authenticated request.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = accounts, treat_none_as_null = true)]
pub struct IdentityChangeset {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub updated_at: DateTime<Utc>,
}

/// Entitlement fields written by the webhook reconciler. `None` leaves a column untouched,
/// `Some(None)` on `plan_expires_at` clears it.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = accounts)]
pub struct BillingChangeset {
    pub plan: String,
    pub usage_limit_monthly: i32,
    pub billing_status: Option<String>,
    pub plan_expires_at: Option<Option<DateTime<Utc>>>,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}
