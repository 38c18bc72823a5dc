use chrono::{DateTime, Utc};
use crates::domain::{
    entities::accounts::AccountEntity,
    value_objects::{
        entitlements::{Entitlement, Feature, PlanLimits},
        enums::plans::Plan,
    },
};

/// Paid means the creator plan with no expiry or an expiry still ahead.
pub fn is_paid(account: &AccountEntity, now: DateTime<Utc>) -> bool {
    account.plan == Plan::Creator
        && account
            .billing
            .plan_expires_at
            .is_none_or(|expires_at| expires_at > now)
}

/// Pure; recomputed on every request since billing state changes asynchronously.
#[derive(Debug, Clone, Copy)]
pub struct EntitlementEvaluator {
    limits: PlanLimits,
}

impl EntitlementEvaluator {
    pub fn new(limits: PlanLimits) -> Self {
        Self { limits }
    }

    pub fn evaluate(
        &self,
        account: &AccountEntity,
        requested: &[Feature],
        now: DateTime<Utc>,
    ) -> Entitlement {
        if is_paid(account, now) {
            return Entitlement {
                is_paid: true,
                max_input_length: self.limits.creator_max_input_chars,
                denied_features: Vec::new(),
            };
        }

        Entitlement {
            is_paid: false,
            max_input_length: self.limits.free_max_input_chars,
            denied_features: requested
                .iter()
                .copied()
                .filter(|feature| matches!(feature, Feature::UrlInput | Feature::Regenerate))
                .collect(),
        }
    }
}
