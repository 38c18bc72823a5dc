use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::accounts::{AccountEntity, BillingChangeset},
    value_objects::enums::{plans::Plan, subscription_statuses::SubscriptionStatus},
};

/// Verified identity claims extracted from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub subject: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

impl IdentityProfile {
    pub fn drifted_from(&self, account: &AccountEntity) -> bool {
        self.email != account.email
            || self.display_name != account.display_name
            || self.email_verified != account.email_verified
    }
}

/// Entitlement state derived from one subscription event.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingUpdate {
    pub plan: Plan,
    pub usage_limit_monthly: i32,
    pub status: SubscriptionStatus,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl BillingUpdate {
    pub fn into_changeset(self, now: DateTime<Utc>) -> BillingChangeset {
        BillingChangeset {
            plan: self.plan.to_string(),
            usage_limit_monthly: self.usage_limit_monthly,
            billing_status: Some(self.status.to_string()),
            plan_expires_at: Some(self.plan_expires_at),
            billing_customer_id: self.customer_id,
            billing_subscription_id: self.subscription_id,
            updated_at: now,
        }
    }
}

/// Read-only projection consumed by the dashboard.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub plan: Plan,
    pub is_paid: bool,
    pub email_verified: bool,
    pub usage_count: i32,
    pub usage_limit_monthly: i32,
    pub usage_reset_at: DateTime<Utc>,
    pub billing_status: Option<SubscriptionStatus>,
    pub plan_expires_at: Option<DateTime<Utc>>,
}

impl AccountView {
    pub fn project(account: &AccountEntity, is_paid: bool) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            plan: account.plan,
            is_paid,
            email_verified: account.email_verified,
            usage_count: account.usage_count,
            usage_limit_monthly: account.usage_limit_monthly,
            usage_reset_at: account.usage_reset_at,
            billing_status: account.billing.status,
            plan_expires_at: account.billing.plan_expires_at,
        }
    }
}
