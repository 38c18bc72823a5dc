use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

/// Billing event kinds the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventKind {
    /// Carries subscription state; drives an entitlement update.
    SubscriptionChanged,
    /// Subscription ended; entitlement update followed by a notification.
    SubscriptionEnded,
    PaymentSucceeded,
    PaymentFailed,
    Unhandled,
}

impl BillingEventKind {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "subscription_created"
            | "subscription_updated"
            | "subscription_cancelled"
            | "subscription_resumed"
            | "subscription_paused"
            | "subscription_unpaused" => BillingEventKind::SubscriptionChanged,
            "subscription_expired" => BillingEventKind::SubscriptionEnded,
            "subscription_payment_success" | "subscription_payment_recovered" => {
                BillingEventKind::PaymentSucceeded
            }
            "subscription_payment_failed" => BillingEventKind::PaymentFailed,
            _ => BillingEventKind::Unhandled,
        }
    }

    pub fn changes_entitlement(&self) -> bool {
        matches!(
            self,
            BillingEventKind::SubscriptionChanged | BillingEventKind::SubscriptionEnded
        )
    }

    pub fn notifies(&self) -> bool {
        matches!(
            self,
            BillingEventKind::SubscriptionEnded
                | BillingEventKind::PaymentSucceeded
                | BillingEventKind::PaymentFailed
        )
    }
}

/// Authenticated, provider-neutral view of one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEvent {
    pub event_id: String,
    pub event_name: String,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub account_hint: Option<Uuid>,
    pub email: Option<String>,
    pub variant_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub period_end: Option<DateTime<Utc>>,
}

impl SubscriptionEvent {
    pub fn kind(&self) -> BillingEventKind {
        BillingEventKind::from_event_name(&self.event_name)
    }
}

/// Whether a subscription in `status` with `period_end` still grants paid access at `now`.
pub fn grants_access(
    status: SubscriptionStatus,
    period_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match status {
        SubscriptionStatus::Active
        | SubscriptionStatus::OnTrial
        | SubscriptionStatus::PastDue
        | SubscriptionStatus::Resumed
        | SubscriptionStatus::Unpaused => true,
        SubscriptionStatus::Cancelled => period_end.is_some_and(|end| end > now),
        SubscriptionStatus::Expired | SubscriptionStatus::Unpaid | SubscriptionStatus::Paused => {
            false
        }
    }
}
