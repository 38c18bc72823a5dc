use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::accounts::{AccountEntity, InsertAccountEntity},
    repositories::accounts::AccountRepository,
    value_objects::{accounts::IdentityProfile, enums::plans::Plan, usage::next_usage_reset},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::validate_supabase_jwt;

/// Every failure maps to one generic message; the reason only goes to logs.
#[derive(Debug, Error)]
#[error("unauthenticated")]
pub struct Unauthenticated;

/// Verifies the bearer credential and loads, creates or syncs the caller's account.
pub struct IdentityResolver<A>
where
    A: AccountRepository + Send + Sync + 'static,
{
    accounts: Arc<A>,
    jwt_secret: String,
    free_usage_limit: i32,
}

impl<A> IdentityResolver<A>
where
    A: AccountRepository + Send + Sync + 'static,
{
    pub fn new(accounts: Arc<A>, jwt_secret: String, free_usage_limit: i32) -> Self {
        Self {
            accounts,
            jwt_secret,
            free_usage_limit,
        }
    }

    pub async fn resolve(
        &self,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AccountEntity, Unauthenticated> {
        let Some(token) = credential else {
            warn!("identity: missing bearer credential");
            return Err(Unauthenticated);
        };

        let profile = validate_supabase_jwt(token, &self.jwt_secret)
            .and_then(|claims| claims.into_profile())
            .map_err(|err| {
                warn!(error = %err, "identity: credential rejected");
                Unauthenticated
            })?;

        self.load_or_create(profile, now).await.map_err(|err| {
            warn!(error = ?err, "identity: account lookup failed");
            Unauthenticated
        })
    }

    async fn load_or_create(
        &self,
        profile: IdentityProfile,
        now: DateTime<Utc>,
    ) -> anyhow::Result<AccountEntity> {
        let account_id = profile.subject;

        let account = match self.accounts.find_by_id(account_id).await? {
            Some(account) => account,
            None => {
                let account = self
                    .accounts
                    .insert_if_absent(InsertAccountEntity {
                        id: account_id,
                        email: profile.email.clone(),
                        display_name: profile.display_name.clone(),
                        plan: Plan::Free.to_string(),
                        email_verified: profile.email_verified,
                        usage_count: 0,
                        usage_limit_monthly: self.free_usage_limit,
                        usage_reset_at: next_usage_reset(now),
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                info!(%account_id, "identity: account created on first request");
                account
            }
        };

        if profile.drifted_from(&account) {
            info!(%account_id, "identity: syncing drifted profile fields");
            return self.accounts.sync_identity(account_id, profile, now).await;
        }

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{FakeAccounts, sample_account};
    use anyhow::anyhow;
    use chrono::{Datelike, Timelike};
    use crates::domain::repositories::accounts::MockAccountRepository;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    const SECRET: &str = "identity-test-secret-identity-test-secret";

    fn token_for(subject: Uuid, email: &str, name: &str, verified: bool) -> String {
        let claims = serde_json::json!({
            "sub": subject.to_string(),
            "aud": "authenticated",
            "role": "authenticated",
            "email": email,
            "exp": 9999999999u64,
            "user_metadata": { "full_name": name, "email_verified": verified },
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn creates_free_account_on_first_request() {
        let accounts = Arc::new(FakeAccounts::default());
        let resolver = IdentityResolver::new(Arc::clone(&accounts), SECRET.to_string(), 5);
        let subject = Uuid::new_v4();
        let now = Utc::now();

        let account = resolver
            .resolve(Some(&token_for(subject, "new@example.com", "New", false)), now)
            .await
            .unwrap();

        assert_eq!(account.id, subject);
        assert_eq!(account.plan, Plan::Free);
        assert_eq!(account.usage_count, 0);
        assert_eq!(account.usage_limit_monthly, 5);
        assert_eq!(account.usage_reset_at.day(), 1);
        assert_eq!(account.usage_reset_at.hour(), 0);
        assert!(account.usage_reset_at > now);
        assert_eq!(accounts.get(subject).email.as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn syncs_drifted_identity_fields() {
        let mut existing = sample_account(Plan::Creator);
        existing.email_verified = false;
        let account_id = existing.id;
        let accounts = Arc::new(FakeAccounts::with(vec![existing]));
        let resolver = IdentityResolver::new(Arc::clone(&accounts), SECRET.to_string(), 5);

        let account = resolver
            .resolve(
                Some(&token_for(account_id, "renamed@example.com", "Renamed", true)),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(account.email.as_deref(), Some("renamed@example.com"));
        assert_eq!(account.display_name.as_deref(), Some("Renamed"));
        assert!(account.email_verified);
        assert_eq!(account.plan, Plan::Creator);
    }

    #[tokio::test]
    async fn missing_or_invalid_credentials_are_unauthenticated() {
        let resolver =
            IdentityResolver::new(Arc::new(FakeAccounts::default()), SECRET.to_string(), 5);

        assert!(resolver.resolve(None, Utc::now()).await.is_err());
        assert!(resolver.resolve(Some("garbage"), Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn datastore_failure_is_unauthenticated() {
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_by_id()
            .returning(|_| Err(anyhow!("pool timed out")));
        let resolver = IdentityResolver::new(Arc::new(accounts), SECRET.to_string(), 5);

        let token = token_for(Uuid::new_v4(), "a@example.com", "A", true);
        assert!(resolver.resolve(Some(&token), Utc::now()).await.is_err());
    }
}
