use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    ai::gemini_client::GeminiClient,
    domain::{
        repositories::{
            accounts::AccountRepository, counter_store::CounterStore,
            generation_jobs::GenerationJobRepository, result_cache::ResultCache,
        },
        value_objects::generation::GenerateRequest,
    },
    infra::{
        counters::CounterBackend,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                accounts::AccountPostgres, generation_cache::GenerationCachePostgres,
                generation_jobs::GenerationJobPostgres,
            },
        },
        result_cache::{ResultCacheBackend, in_memory::InMemoryResultCache},
    },
};
use tracing::info;

use crate::{
    auth::Credential,
    axum_http::client_address::client_id,
    config::config_model::{DotEnvyConfig, ResultCacheStore},
    usecases::{
        abuse_throttle::AbuseThrottle,
        content_acquirer::{ContentSource, ReqwestFetcher, SafeContentAcquirer, SystemResolver},
        cooldown::CooldownTracker,
        entitlements::EntitlementEvaluator,
        generate::{GenerateUseCase, TextGenerator},
        identity::IdentityResolver,
        quota::QuotaTracker,
        result_cache::ResultCacheGate,
    },
};

pub struct GenerateRouteState<A, C, R, J, S, G>
where
    A: AccountRepository + Send + Sync + 'static,
    C: CounterStore + Send + Sync + 'static,
    R: ResultCache + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
    S: ContentSource + Send + Sync + 'static,
    G: TextGenerator + Send + Sync + 'static,
{
    usecase: GenerateUseCase<A, C, R, J, S, G>,
    trust_proxy_headers: bool,
}

pub fn routes(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    counters: Arc<CounterBackend>,
) -> Result<Router> {
    let accounts = Arc::new(AccountPostgres::new(Arc::clone(&db_pool)));
    let jobs = Arc::new(GenerationJobPostgres::new(Arc::clone(&db_pool)));
    let cache = Arc::new(match config.result_cache {
        ResultCacheStore::Postgres => {
            ResultCacheBackend::Postgres(GenerationCachePostgres::new(Arc::clone(&db_pool)))
        }
        ResultCacheStore::Memory => ResultCacheBackend::InMemory(InMemoryResultCache::new()),
    });

    let content = Arc::new(SafeContentAcquirer::new(
        Arc::new(SystemResolver),
        Arc::new(ReqwestFetcher::new(Duration::from_secs(
            config.acquisition.timeout_seconds,
        ))),
        config.acquisition.max_chars,
        config.acquisition.min_chars,
    )?);

    let generation_timeout = Duration::from_secs(config.generator.timeout_seconds);
    let generator = Arc::new(GeminiClient::new(
        config.generator.api_key.clone(),
        config.generator.model.clone(),
        generation_timeout,
    )?);

    let usecase = GenerateUseCase::new(
        AbuseThrottle::new(
            Arc::clone(&counters),
            config.throttle.max_requests,
            Duration::from_secs(config.throttle.window_seconds),
            config.throttle.fail_policy,
        ),
        IdentityResolver::new(
            Arc::clone(&accounts),
            config.supabase.jwt_secret.clone(),
            config.plans.free_usage_limit,
        ),
        EntitlementEvaluator::new(config.plans),
        CooldownTracker::new(
            Arc::clone(&counters),
            Duration::from_secs(config.cooldown.paid_seconds),
            Duration::from_secs(config.cooldown.free_seconds),
            config.cooldown.fail_policy,
        ),
        QuotaTracker::new(Arc::clone(&accounts), config.plans.free_usage_limit),
        content,
        ResultCacheGate::new(cache),
        jobs,
        generator,
        generation_timeout,
    );

    info!(
        counters = counters.name(),
        result_cache = ?config.result_cache,
        model = %config.generator.model,
        "generate router: initialized"
    );

    Ok(router(usecase, config.backend_server.trust_proxy_headers))
}

pub fn router<A, C, R, J, S, G>(
    usecase: GenerateUseCase<A, C, R, J, S, G>,
    trust_proxy_headers: bool,
) -> Router
where
    A: AccountRepository + Send + Sync + 'static,
    C: CounterStore + Send + Sync + 'static,
    R: ResultCache + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
    S: ContentSource + Send + Sync + 'static,
    G: TextGenerator + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(generate))
        .with_state(Arc::new(GenerateRouteState {
            usecase,
            trust_proxy_headers,
        }))
}

pub async fn generate<A, C, R, J, S, G>(
    State(state): State<Arc<GenerateRouteState<A, C, R, J, S, G>>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    credential: Credential,
    body: Bytes,
) -> Response
where
    A: AccountRepository + Send + Sync + 'static,
    C: CounterStore + Send + Sync + 'static,
    R: ResultCache + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
    S: ContentSource + Send + Sync + 'static,
    G: TextGenerator + Send + Sync + 'static,
{
    let client = client_id(&headers, peer.as_ref(), state.trust_proxy_headers);
    let request = serde_json::from_slice::<GenerateRequest>(&body)
        .map_err(|err| format!("invalid request body: {err}"));

    match state
        .usecase
        .generate(&client, credential.token(), request)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        content_acquirer::MockContentSource,
        generate::MockTextGenerator,
        test_support::{FakeAccounts, sample_account},
    };
    use axum::{body::Body, http::Request};
    use crates::{
        domain::{
            repositories::generation_jobs::MockGenerationJobRepository,
            value_objects::{
                counters::FailPolicy, entitlements::PlanLimits, enums::plans::Plan,
            },
        },
        infra::counters::in_memory::InMemoryCounterStore,
    };
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret-router-test-secret";

    fn app(accounts: Arc<FakeAccounts>, generator: MockTextGenerator) -> Router {
        let counters = Arc::new(InMemoryCounterStore::new());
        let usecase = GenerateUseCase::new(
            AbuseThrottle::new(
                Arc::clone(&counters),
                100,
                Duration::from_secs(60),
                FailPolicy::Open,
            ),
            IdentityResolver::new(Arc::clone(&accounts), SECRET.to_string(), 5),
            EntitlementEvaluator::new(PlanLimits::default()),
            CooldownTracker::new(
                Arc::clone(&counters),
                Duration::ZERO,
                Duration::ZERO,
                FailPolicy::Open,
            ),
            QuotaTracker::new(Arc::clone(&accounts), 5),
            Arc::new(MockContentSource::new()),
            ResultCacheGate::new(Arc::new(InMemoryResultCache::new())),
            Arc::new(MockGenerationJobRepository::new()),
            Arc::new(generator),
            Duration::from_secs(60),
        );
        router(usecase, false)
    }

    fn bearer(account_id: uuid::Uuid) -> String {
        let claims = serde_json::json!({
            "sub": account_id.to_string(),
            "aud": "authenticated",
            "email": "creator@example.com",
            "exp": 9999999999u64,
            "user_metadata": { "full_name": "Creator", "email_verified": true },
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn returns_outputs_for_valid_request() {
        let account = sample_account(Plan::Creator);
        let authorization = bearer(account.id);
        let mut generator = MockTextGenerator::new();
        generator.expect_tag().return_const("gemini:test".to_string());
        generator
            .expect_generate()
            .returning(|_| Ok("a caption".to_string()));
        let app = app(Arc::new(FakeAccounts::with(vec![account])), generator);

        let response = app
            .oneshot(
                Request::post("/")
                    .header("authorization", authorization)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"inputType":"text","inputText":"launch notes","formats":["instagram_caption"]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["outputs"]["instagram_caption"], "a caption");
        assert_eq!(body["fromCache"]["instagram_caption"], false);
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized_even_with_bad_body() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        let app = app(Arc::new(FakeAccounts::default()), generator);

        let response = app
            .oneshot(Request::post("/").body(Body::from("{")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error_once_authenticated() {
        let account = sample_account(Plan::Free);
        let authorization = bearer(account.id);
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        let app = app(Arc::new(FakeAccounts::with(vec![account])), generator);

        let response = app
            .oneshot(
                Request::post("/")
                    .header("authorization", authorization)
                    .body(Body::from(r#"{"inputType":"video"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
