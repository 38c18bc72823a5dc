use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::accounts::AccountEntity,
        repositories::accounts::AccountRepository,
        value_objects::{
            accounts::BillingUpdate,
            entitlements::PlanLimits,
            enums::{plans::Plan, subscription_statuses::SubscriptionStatus},
            subscription_events::{BillingEventKind, SubscriptionEvent, grants_access},
        },
    },
    notifications::{billing_emails::billing_email, resend_client::ResendClient},
    payments::lemon_squeezy::{parse_event, verify_signature},
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("billing notification could not be delivered")]
    NotificationFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature => StatusCode::BAD_REQUEST,
            WebhookError::NotificationFailed(_) | WebhookError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "invalid_signature",
            WebhookError::NotificationFailed(_) => "notification_failed",
            WebhookError::Internal(_) => "internal_error",
        }
    }
}

/// How a verified delivery was settled. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied { plan: Plan, notified: bool },
    Notified,
    AlreadyNotified,
    Ignored(&'static str),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingNotifier: Send + Sync {
    async fn notify(&self, account: &AccountEntity, kind: BillingEventKind) -> Result<()>;
}

#[async_trait]
impl BillingNotifier for ResendClient {
    async fn notify(&self, account: &AccountEntity, kind: BillingEventKind) -> Result<()> {
        let Some(email) = billing_email(kind, account.display_name.as_deref()) else {
            return Ok(());
        };
        let Some(to) = account.email.as_deref() else {
            warn!(account_id = %account.id, "billing_webhook: account has no email, notification skipped");
            return Ok(());
        };

        let message_id = self.send_email(to, &email.subject, &email.text).await?;
        info!(
            account_id = %account.id,
            message_id = message_id.as_deref().unwrap_or("unknown"),
            "billing_webhook: notification sent"
        );
        Ok(())
    }
}

/// Used when no email provider is configured.
pub struct LogOnlyNotifier;

#[async_trait]
impl BillingNotifier for LogOnlyNotifier {
    async fn notify(&self, account: &AccountEntity, kind: BillingEventKind) -> Result<()> {
        if let Some(email) = billing_email(kind, account.display_name.as_deref()) {
            info!(
                account_id = %account.id,
                subject = %email.subject,
                "billing_webhook: email disabled, notification logged only"
            );
        }
        Ok(())
    }
}

/// verify → parse → resolve account → check variant → apply state → notify.
pub struct WebhookUseCase<A, N>
where
    A: AccountRepository + Send + Sync + 'static,
    N: BillingNotifier + Send + Sync + 'static,
{
    accounts: Arc<A>,
    notifier: Arc<N>,
    webhook_secret: String,
    creator_variant_id: String,
    limits: PlanLimits,
}

impl<A, N> WebhookUseCase<A, N>
where
    A: AccountRepository + Send + Sync + 'static,
    N: BillingNotifier + Send + Sync + 'static,
{
    pub fn new(
        accounts: Arc<A>,
        notifier: Arc<N>,
        webhook_secret: String,
        creator_variant_id: String,
        limits: PlanLimits,
    ) -> Self {
        Self {
            accounts,
            notifier,
            webhook_secret,
            creator_variant_id,
            limits,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = signature.unwrap_or_default();
        if !verify_signature(payload, signature, &self.webhook_secret) {
            warn!(
                has_signature = !signature.is_empty(),
                "billing_webhook: signature verification failed"
            );
            return Err(WebhookError::InvalidSignature);
        }

        let event = match parse_event(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = ?err, "billing_webhook: verified payload could not be parsed, acknowledging");
                return Ok(WebhookOutcome::Ignored("malformed_payload"));
            }
        };

        let kind = event.kind();
        if kind == BillingEventKind::Unhandled {
            info!(event_name = %event.event_name, "billing_webhook: event ignored");
            return Ok(WebhookOutcome::Ignored("unhandled_event"));
        }

        let Some(account) = self.resolve_account(&event).await? else {
            warn!(
                event_name = %event.event_name,
                event_id = %event.event_id,
                has_hint = event.account_hint.is_some(),
                has_email = event.email.is_some(),
                "billing_webhook: no account matches event, acknowledging without changes"
            );
            return Ok(WebhookOutcome::Ignored("account_not_found"));
        };

        let now = Utc::now();

        if kind.changes_entitlement() {
            if event.variant_id.as_deref() != Some(self.creator_variant_id.as_str()) {
                warn!(
                    account_id = %account.id,
                    event_name = %event.event_name,
                    variant_id = event.variant_id.as_deref().unwrap_or("none"),
                    "billing_webhook: variant does not match the creator plan, ignoring"
                );
                return Ok(WebhookOutcome::Ignored("variant_mismatch"));
            }

            let Some(update) = self.billing_update(&event, now) else {
                warn!(
                    account_id = %account.id,
                    event_name = %event.event_name,
                    "billing_webhook: subscription event without a known status, ignoring"
                );
                return Ok(WebhookOutcome::Ignored("unknown_status"));
            };
            let plan = update.plan;

            let account = self
                .accounts
                .apply_billing_update(account.id, update, now)
                .await?;
            info!(
                account_id = %account.id,
                event_name = %event.event_name,
                plan = %account.plan,
                usage_limit_monthly = account.usage_limit_monthly,
                "billing_webhook: entitlement updated"
            );

            let notified = if kind.notifies() {
                self.notify_once(&account, kind, &event.event_id, now)
                    .await?
            } else {
                false
            };
            return Ok(WebhookOutcome::Applied { plan, notified });
        }

        if self
            .notify_once(&account, kind, &event.event_id, now)
            .await?
        {
            Ok(WebhookOutcome::Notified)
        } else {
            Ok(WebhookOutcome::AlreadyNotified)
        }
    }

    async fn resolve_account(&self, event: &SubscriptionEvent) -> Result<Option<AccountEntity>> {
        if let Some(account_id) = event.account_hint {
            if let Some(account) = self.accounts.find_by_id(account_id).await? {
                return Ok(Some(account));
            }
        }
        match event.email.as_deref() {
            Some(email) => self.accounts.find_by_email(email).await,
            None => Ok(None),
        }
    }

    fn billing_update(&self, event: &SubscriptionEvent, now: DateTime<Utc>) -> Option<BillingUpdate> {
        let status = match (event.status, event.kind()) {
            (Some(status), _) => status,
            (None, BillingEventKind::SubscriptionEnded) => SubscriptionStatus::Expired,
            (None, _) => return None,
        };

        let has_access = grants_access(status, event.period_end, now);
        let (plan, usage_limit_monthly) = if has_access {
            (Plan::Creator, self.limits.creator_usage_limit)
        } else {
            (Plan::Free, self.limits.free_usage_limit)
        };

        // Active subscriptions carry no expiry; the renewal date is not a cut-off.
        let plan_expires_at = match status {
            SubscriptionStatus::Cancelled
            | SubscriptionStatus::Expired
            | SubscriptionStatus::Unpaid
            | SubscriptionStatus::Paused => event.period_end,
            _ => None,
        };

        Some(BillingUpdate {
            plan,
            usage_limit_monthly,
            status,
            plan_expires_at,
            customer_id: event.customer_id.clone(),
            subscription_id: event.subscription_id.clone(),
        })
    }

    /// Returns whether a notification went out. The marker is written only after a successful send.
    async fn notify_once(
        &self,
        account: &AccountEntity,
        kind: BillingEventKind,
        event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, WebhookError> {
        if account.has_notified(event_id) {
            info!(account_id = %account.id, event_id, "billing_webhook: notification already sent");
            return Ok(false);
        }

        self.notifier.notify(account, kind).await.map_err(|err| {
            warn!(account_id = %account.id, event_id, error = ?err, "billing_webhook: notification failed");
            WebhookError::NotificationFailed(err)
        })?;

        self.accounts
            .record_notified_event(account.id, event_id.to_string(), now)
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{FakeAccounts, sample_account};
    use anyhow::anyhow;
    use chrono::{Duration, SecondsFormat};
    use crates::payments::lemon_squeezy::compute_signature;
    use serde_json::json;
    use uuid::Uuid;

    const SECRET: &str = "whsec-test";
    const CREATOR_VARIANT: &str = "411";

    fn usecase<N: BillingNotifier + 'static>(
        accounts: Arc<FakeAccounts>,
        notifier: N,
    ) -> WebhookUseCase<FakeAccounts, N> {
        WebhookUseCase::new(
            accounts,
            Arc::new(notifier),
            SECRET.to_string(),
            CREATOR_VARIANT.to_string(),
            PlanLimits::default(),
        )
    }

    fn subscription_body(
        event_name: &str,
        webhook_id: &str,
        account_id: Uuid,
        status: &str,
        variant_id: &str,
        ends_at: DateTime<Utc>,
    ) -> Vec<u8> {
        json!({
            "meta": {
                "event_name": event_name,
                "webhook_id": webhook_id,
                "custom_data": { "user_id": account_id.to_string() },
            },
            "data": {
                "type": "subscriptions",
                "id": "sub_1",
                "attributes": {
                    "status": status,
                    "customer_id": 77,
                    "variant_id": variant_id.parse::<u64>().unwrap(),
                    "user_email": "creator@example.com",
                    "renews_at": ends_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    "ends_at": ends_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                },
            },
        })
        .to_string()
        .into_bytes()
    }

    fn invoice_body(event_name: &str, webhook_id: &str, email: &str) -> Vec<u8> {
        json!({
            "meta": { "event_name": event_name, "webhook_id": webhook_id },
            "data": {
                "type": "subscription-invoices",
                "id": "inv_1",
                "attributes": {
                    "status": "paid",
                    "customer_id": 77,
                    "subscription_id": 1,
                    "user_email": email,
                },
            },
        })
        .to_string()
        .into_bytes()
    }

    fn sign(body: &[u8]) -> String {
        compute_signature(SECRET, body).unwrap()
    }

    #[tokio::test]
    async fn rejects_bad_signature_without_touching_accounts() {
        let account = sample_account(Plan::Free);
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account]));
        let mut notifier = MockBillingNotifier::new();
        notifier.expect_notify().never();
        let usecase = usecase(Arc::clone(&accounts), notifier);

        let body = subscription_body(
            "subscription_created",
            "wh_1",
            account_id,
            "active",
            CREATOR_VARIANT,
            Utc::now() + Duration::days(30),
        );
        let forged = compute_signature("another-secret", &body).unwrap();

        let result = usecase.handle(&body, Some(&forged)).await;
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        assert_eq!(result.unwrap_err().status_code(), StatusCode::BAD_REQUEST);

        let mut tampered = body.clone();
        tampered.push(b' ');
        assert!(matches!(
            usecase.handle(&tampered, Some(&sign(&body))).await,
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            usecase.handle(&body, None).await,
            Err(WebhookError::InvalidSignature)
        ));
        assert_eq!(accounts.get(account_id).plan, Plan::Free);
    }

    #[tokio::test]
    async fn cancelled_subscription_keeps_access_until_period_end() {
        let future = sample_account(Plan::Creator);
        let mut past = sample_account(Plan::Creator);
        past.email = Some("past@example.com".to_string());
        let (future_id, past_id) = (future.id, past.id);
        let accounts = Arc::new(FakeAccounts::with(vec![future, past]));
        let usecase = usecase(Arc::clone(&accounts), MockBillingNotifier::new());

        let body = subscription_body(
            "subscription_cancelled",
            "wh_future",
            future_id,
            "cancelled",
            CREATOR_VARIANT,
            Utc::now() + Duration::days(10),
        );
        let outcome = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                plan: Plan::Creator,
                notified: false
            }
        );
        let stored = accounts.get(future_id);
        assert_eq!(stored.plan, Plan::Creator);
        assert_eq!(stored.billing.status, Some(SubscriptionStatus::Cancelled));
        assert!(stored.billing.plan_expires_at.is_some());

        let body = subscription_body(
            "subscription_cancelled",
            "wh_past",
            past_id,
            "cancelled",
            CREATOR_VARIANT,
            Utc::now() - Duration::days(1),
        );
        usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        let stored = accounts.get(past_id);
        assert_eq!(stored.plan, Plan::Free);
        assert_eq!(stored.usage_limit_monthly, PlanLimits::default().free_usage_limit);
    }

    #[tokio::test]
    async fn variant_mismatch_never_changes_plan() {
        let account = sample_account(Plan::Free);
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account]));
        let usecase = usecase(Arc::clone(&accounts), MockBillingNotifier::new());

        for status in ["active", "on_trial", "cancelled", "expired"] {
            let body = subscription_body(
                "subscription_updated",
                &format!("wh_{status}"),
                account_id,
                status,
                "999",
                Utc::now() + Duration::days(30),
            );
            let outcome = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
            assert_eq!(outcome, WebhookOutcome::Ignored("variant_mismatch"));
        }

        let stored = accounts.get(account_id);
        assert_eq!(stored.plan, Plan::Free);
        assert_eq!(stored.billing.status, None);
    }

    #[tokio::test]
    async fn replayed_expiry_notifies_once() {
        let account = sample_account(Plan::Creator);
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account]));

        let mut notifier = MockBillingNotifier::new();
        notifier
            .expect_notify()
            .withf(|_, kind| *kind == BillingEventKind::SubscriptionEnded)
            .times(1)
            .returning(|_, _| Ok(()));
        let usecase = usecase(Arc::clone(&accounts), notifier);

        let body = subscription_body(
            "subscription_expired",
            "wh_expired",
            account_id,
            "expired",
            CREATOR_VARIANT,
            Utc::now() - Duration::days(1),
        );

        let first = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(
            first,
            WebhookOutcome::Applied {
                plan: Plan::Free,
                notified: true
            }
        );
        let after_first = accounts.get(account_id);

        let second = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(
            second,
            WebhookOutcome::Applied {
                plan: Plan::Free,
                notified: false
            }
        );
        let after_second = accounts.get(account_id);

        assert_eq!(after_first.plan, after_second.plan);
        assert_eq!(
            after_first.usage_limit_monthly,
            after_second.usage_limit_monthly
        );
        assert_eq!(
            after_first.notified_billing_events,
            after_second.notified_billing_events
        );
        assert_eq!(after_second.notified_billing_events, vec!["wh_expired".to_string()]);
    }

    #[tokio::test]
    async fn failed_notification_is_retried_on_redelivery() {
        let account = sample_account(Plan::Creator);
        let accounts = Arc::new(FakeAccounts::with(vec![account.clone()]));

        let mut notifier = MockBillingNotifier::new();
        let mut attempts = 0;
        notifier.expect_notify().times(2).returning(move |_, _| {
            attempts += 1;
            if attempts == 1 {
                Err(anyhow!("smtp unavailable"))
            } else {
                Ok(())
            }
        });
        let usecase = usecase(Arc::clone(&accounts), notifier);

        let body = invoice_body(
            "subscription_payment_failed",
            "wh_payment_failed",
            "creator@example.com",
        );

        let first = usecase.handle(&body, Some(&sign(&body))).await;
        match first {
            Err(err) => assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR),
            Ok(outcome) => panic!("expected failure, got {outcome:?}"),
        }
        assert!(accounts.get(account.id).notified_billing_events.is_empty());

        let second = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(second, WebhookOutcome::Notified);
        assert!(accounts.get(account.id).has_notified("wh_payment_failed"));

        let third = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(third, WebhookOutcome::AlreadyNotified);
    }

    #[tokio::test]
    async fn falls_back_to_email_and_acknowledges_unknown_accounts() {
        let account = sample_account(Plan::Free);
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account]));
        let usecase = usecase(Arc::clone(&accounts), MockBillingNotifier::new());

        // Hint points nowhere; the email still matches.
        let body = subscription_body(
            "subscription_created",
            "wh_email",
            Uuid::new_v4(),
            "active",
            CREATOR_VARIANT,
            Utc::now() + Duration::days(30),
        );
        usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        let stored = accounts.get(account_id);
        assert_eq!(stored.plan, Plan::Creator);
        assert_eq!(stored.billing.plan_expires_at, None);
        assert_eq!(stored.billing.subscription_id.as_deref(), Some("sub_1"));

        let body = invoice_body(
            "subscription_payment_success",
            "wh_stranger",
            "stranger@example.com",
        );
        let outcome = usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("account_not_found"));
    }

    #[tokio::test]
    async fn acknowledges_unhandled_and_malformed_events() {
        let accounts = Arc::new(FakeAccounts::default());
        let usecase = usecase(accounts, MockBillingNotifier::new());

        let body = json!({"meta": {"event_name": "order_created"}, "data": {"type": "orders", "id": "1", "attributes": {}}})
            .to_string()
            .into_bytes();
        assert_eq!(
            usecase.handle(&body, Some(&sign(&body))).await.unwrap(),
            WebhookOutcome::Ignored("unhandled_event")
        );

        let body = b"not json".to_vec();
        assert_eq!(
            usecase.handle(&body, Some(&sign(&body))).await.unwrap(),
            WebhookOutcome::Ignored("malformed_payload")
        );
    }

    #[tokio::test]
    async fn paused_subscription_revokes_access() {
        let account = sample_account(Plan::Creator);
        let account_id = account.id;
        let accounts = Arc::new(FakeAccounts::with(vec![account]));
        let usecase = usecase(Arc::clone(&accounts), MockBillingNotifier::new());

        let body = subscription_body(
            "subscription_paused",
            "wh_paused",
            account_id,
            "paused",
            CREATOR_VARIANT,
            Utc::now() + Duration::days(30),
        );
        usecase.handle(&body, Some(&sign(&body))).await.unwrap();
        assert_eq!(accounts.get(account_id).plan, Plan::Free);
    }
}
