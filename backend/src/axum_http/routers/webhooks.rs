use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::repositories::accounts::AccountRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::accounts::AccountPostgres,
    },
    notifications::resend_client::ResendClient,
    payments::lemon_squeezy::SIGNATURE_HEADER,
};
use serde_json::json;
use tracing::info;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::billing_webhook::{BillingNotifier, LogOnlyNotifier, WebhookUseCase},
};

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let accounts = Arc::new(AccountPostgres::new(Arc::clone(&db_pool)));
    let secret = config.billing.webhook_secret.clone();
    let variant = config.billing.creator_variant_id.clone();

    match &config.email {
        Some(email) => {
            let notifier = ResendClient::new(email.resend_api_key.clone(), email.from.clone());
            router(WebhookUseCase::new(
                accounts,
                Arc::new(notifier),
                secret,
                variant,
                config.plans,
            ))
        }
        None => {
            info!("billing webhook router: RESEND_API_KEY not set, notifications are logged only");
            router(WebhookUseCase::new(
                accounts,
                Arc::new(LogOnlyNotifier),
                secret,
                variant,
                config.plans,
            ))
        }
    }
}

pub fn router<A, N>(usecase: WebhookUseCase<A, N>) -> Router
where
    A: AccountRepository + Send + Sync + 'static,
    N: BillingNotifier + Send + Sync + 'static,
{
    Router::new()
        .route("/lemon-squeezy", post(lemon_squeezy))
        .with_state(Arc::new(usecase))
}

pub async fn lemon_squeezy<A, N>(
    State(usecase): State<Arc<WebhookUseCase<A, N>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    A: AccountRepository + Send + Sync + 'static,
    N: BillingNotifier + Send + Sync + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle(&body, signature).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "billing webhook router: delivery acknowledged");
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{billing_webhook::MockBillingNotifier, test_support::FakeAccounts};
    use axum::{body::Body, http::Request};
    use crates::{
        domain::value_objects::entitlements::PlanLimits,
        payments::lemon_squeezy::compute_signature,
    };
    use tower::ServiceExt;

    const SECRET: &str = "router-webhook-secret";

    fn app() -> Router {
        let mut notifier = MockBillingNotifier::new();
        notifier.expect_notify().never();
        router(WebhookUseCase::new(
            Arc::new(FakeAccounts::default()),
            Arc::new(notifier),
            SECRET.to_string(),
            "411".to_string(),
            PlanLimits::default(),
        ))
    }

    fn delivery(body: &'static str, signature: &str) -> Request<Body> {
        Request::post("/lemon-squeezy")
            .header(SIGNATURE_HEADER, signature)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_with_400() {
        let body = r#"{"meta":{"event_name":"subscription_created"},"data":{"id":"1","attributes":{}}}"#;
        let response = app()
            .oneshot(delivery(body, "deadbeef"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ignored_event_is_acknowledged_with_200() {
        let body = r#"{"meta":{"event_name":"order_refunded"},"data":{"type":"orders","id":"5","attributes":{}}}"#;
        let signature = compute_signature(SECRET, body.as_bytes()).unwrap();
        let response = app()
            .oneshot(delivery(body, &signature))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unresolvable_account_is_acknowledged_with_200() {
        let body = r#"{"meta":{"event_name":"subscription_created","webhook_id":"wh_9"},"data":{"type":"subscriptions","id":"9","attributes":{"status":"active","variant_id":411,"user_email":"nobody@example.com"}}}"#;
        let signature = compute_signature(SECRET, body.as_bytes()).unwrap();
        let response = app()
            .oneshot(delivery(body, &signature))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
