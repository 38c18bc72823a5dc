use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Subscription status as reported by the billing provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    OnTrial,
    PastDue,
    Paused,
    Cancelled,
    Expired,
    Unpaid,
    Resumed,
    Unpaused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::OnTrial => "on_trial",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Resumed => "resumed",
            SubscriptionStatus::Unpaused => "unpaused",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(SubscriptionStatus::Active),
            "on_trial" => Some(SubscriptionStatus::OnTrial),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "paused" => Some(SubscriptionStatus::Paused),
            // Both spellings show up in provider payloads and older rows.
            "cancelled" | "canceled" => Some(SubscriptionStatus::Cancelled),
            "expired" => Some(SubscriptionStatus::Expired),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            "resumed" => Some(SubscriptionStatus::Resumed),
            "unpaused" => Some(SubscriptionStatus::Unpaused),
            _ => None,
        }
    }
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
