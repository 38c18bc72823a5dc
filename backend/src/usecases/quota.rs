use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::accounts::AccountEntity,
    repositories::accounts::AccountRepository,
    value_objects::{
        enums::plans::Plan,
        usage::{UsageSnapshot, next_usage_reset},
    },
};
use tracing::info;

use crate::usecases::entitlements::is_paid;

/// Outcome of charging one unit against the monthly limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCharge {
    Counted(UsageSnapshot),
    /// Another request spent the last unit first.
    Exhausted(UsageSnapshot),
}

pub struct QuotaTracker<A>
where
    A: AccountRepository + Send + Sync + 'static,
{
    accounts: Arc<A>,
    free_usage_limit: i32,
}

impl<A> QuotaTracker<A>
where
    A: AccountRepository + Send + Sync + 'static,
{
    pub fn new(accounts: Arc<A>, free_usage_limit: i32) -> Self {
        Self {
            accounts,
            free_usage_limit,
        }
    }

    pub fn free_usage_limit(&self) -> i32 {
        self.free_usage_limit
    }

    /// Limit in force at `now`. A creator past `plan_expires_at` is held to the free limit until
    /// the expiry event downgrades the stored row.
    pub fn effective_limit(&self, account: &AccountEntity, now: DateTime<Utc>) -> i32 {
        if account.plan == Plan::Creator && !is_paid(account, now) {
            account.usage_limit_monthly.min(self.free_usage_limit)
        } else {
            account.usage_limit_monthly
        }
    }

    fn snapshot(&self, account: &AccountEntity, now: DateTime<Utc>) -> UsageSnapshot {
        UsageSnapshot {
            usage_count: account.usage_count,
            usage_limit_monthly: self.effective_limit(account, now),
            usage_reset_at: account.usage_reset_at,
        }
    }

    /// Applies the monthly reset when due, then reports the current counters.
    pub async fn check_and_reset(
        &self,
        account: &AccountEntity,
        now: DateTime<Utc>,
    ) -> Result<UsageSnapshot> {
        if now < account.usage_reset_at {
            return Ok(self.snapshot(account, now));
        }

        let account_id = account.id;
        let refreshed = self
            .accounts
            .reset_usage_if_due(account_id, now, next_usage_reset(now))
            .await?;
        info!(
            %account_id,
            usage_reset_at = %refreshed.usage_reset_at,
            "quota: monthly usage reset applied"
        );

        Ok(self.snapshot(&refreshed, now))
    }

    /// One unit per accepted request, however many formats it produced. The store only counts
    /// the unit while the limit has room.
    pub async fn increment(&self, account: &AccountEntity, now: DateTime<Utc>) -> Result<QuotaCharge> {
        let account_id = account.id;
        let limit = self.effective_limit(account, now);

        match self.accounts.increment_usage(account_id, limit, now).await? {
            Some(updated) => Ok(QuotaCharge::Counted(self.snapshot(&updated, now))),
            None => {
                let current = self
                    .accounts
                    .find_by_id(account_id)
                    .await?
                    .unwrap_or_else(|| account.clone());
                info!(%account_id, limit, "quota: limit reached while the request was running");
                Ok(QuotaCharge::Exhausted(self.snapshot(&current, now)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{FakeAccounts, sample_account};
    use chrono::{Duration, TimeZone};
    use crates::domain::repositories::accounts::MockAccountRepository;
    use mockall::predicate::eq;

    const FREE_LIMIT: i32 = 5;

    #[tokio::test]
    async fn resets_when_reset_instant_has_passed() {
        let now = Utc.with_ymd_and_hms(2025, 7, 3, 9, 30, 0).unwrap();
        let mut account = sample_account(Plan::Free);
        account.usage_count = 5;
        account.usage_reset_at = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let accounts = Arc::new(FakeAccounts::with(vec![account.clone()]));

        let usage = QuotaTracker::new(Arc::clone(&accounts), FREE_LIMIT)
            .check_and_reset(&account, now)
            .await
            .unwrap();

        assert_eq!(usage.usage_count, 0);
        assert_eq!(
            usage.usage_reset_at,
            Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(accounts.get(account.id).usage_count, 0);
    }

    #[tokio::test]
    async fn leaves_counters_alone_before_reset() {
        let mut account = sample_account(Plan::Free);
        account.usage_count = 3;

        // No repository call expected.
        let accounts = MockAccountRepository::new();
        let usage = QuotaTracker::new(Arc::new(accounts), FREE_LIMIT)
            .check_and_reset(&account, Utc::now())
            .await
            .unwrap();

        assert_eq!(usage.usage_count, 3);
        assert!(!usage.is_exhausted());
    }

    #[tokio::test]
    async fn lapsed_creator_is_held_to_the_free_limit() {
        let now = Utc::now();
        let mut account = sample_account(Plan::Creator);
        account.usage_count = 10;
        account.billing.plan_expires_at = Some(now - Duration::hours(1));
        let accounts = Arc::new(FakeAccounts::with(vec![account.clone()]));
        let tracker = QuotaTracker::new(Arc::clone(&accounts), FREE_LIMIT);

        let usage = tracker.check_and_reset(&account, now).await.unwrap();
        assert_eq!(usage.usage_limit_monthly, FREE_LIMIT);
        assert!(usage.is_exhausted());

        assert!(matches!(
            tracker.increment(&account, now).await.unwrap(),
            QuotaCharge::Exhausted(_)
        ));
        assert_eq!(accounts.get(account.id).usage_count, 10);
    }

    #[test]
    fn cancelled_creator_keeps_paid_limit_until_period_end() {
        let now = Utc::now();
        let mut account = sample_account(Plan::Creator);
        account.billing.plan_expires_at = Some(now + Duration::days(3));

        let tracker = QuotaTracker::new(Arc::new(MockAccountRepository::new()), FREE_LIMIT);
        assert_eq!(tracker.effective_limit(&account, now), 100);
    }

    #[tokio::test]
    async fn increment_passes_the_limit_to_the_store() {
        let mut account = sample_account(Plan::Creator);
        let account_id = account.id;
        let now = Utc::now();
        let mut stored = account.clone();
        stored.usage_count = 8;
        account.usage_count = 7;

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_increment_usage()
            .with(eq(account_id), eq(100), eq(now))
            .times(1)
            .returning(move |_, _, _| Ok(Some(stored.clone())));

        let charge = QuotaTracker::new(Arc::new(accounts), FREE_LIMIT)
            .increment(&account, now)
            .await
            .unwrap();
        let QuotaCharge::Counted(usage) = charge else {
            panic!("expected the unit to be counted, got {charge:?}");
        };
        assert_eq!(usage.usage_count, 8);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let account = sample_account(Plan::Creator);
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account.clone()]));
        let tracker = Arc::new(QuotaTracker::new(Arc::clone(&accounts), FREE_LIMIT));

        let handles = (0..10)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let account = account.clone();
                tokio::spawn(async move { tracker.increment(&account, Utc::now()).await })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(accounts.get(account_id).usage_count, 10);
    }

    #[tokio::test]
    async fn concurrent_increments_stop_at_the_limit() {
        let mut account = sample_account(Plan::Creator);
        account.usage_count = 97;
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account.clone()]));
        let tracker = Arc::new(QuotaTracker::new(Arc::clone(&accounts), FREE_LIMIT));

        let handles = (0..6)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let account = account.clone();
                tokio::spawn(async move { tracker.increment(&account, Utc::now()).await })
            })
            .collect::<Vec<_>>();

        let mut counted = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                QuotaCharge::Counted(_) => counted += 1,
                QuotaCharge::Exhausted(usage) => {
                    assert!(usage.is_exhausted());
                    exhausted += 1;
                }
            }
        }

        assert_eq!((counted, exhausted), (3, 3));
        assert_eq!(accounts.get(account_id).usage_count, 100);
    }
}
