use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::{
    ai::{
        gemini_client::{GeminiClient, GeminiError},
        prompts::build_prompt,
    },
    domain::{
        entities::{accounts::AccountEntity, generation_jobs::InsertGenerationJobEntity},
        repositories::{
            accounts::AccountRepository, counter_store::CounterStore,
            generation_jobs::GenerationJobRepository, result_cache::ResultCache,
        },
        value_objects::{
            entitlements::{Entitlement, Feature},
            enums::output_formats::OutputFormat,
            generation::{
                CachedOutput, GenerateRequest, GenerateResponse, InputType, ResolvedContext,
            },
            usage::UsageSnapshot,
        },
    },
};
use futures::future::try_join_all;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    abuse_throttle::AbuseThrottle,
    content_acquirer::{AcquisitionError, ContentSource, truncate_chars},
    cooldown::CooldownTracker,
    entitlements::EntitlementEvaluator,
    identity::IdentityResolver,
    quota::{QuotaCharge, QuotaTracker},
    result_cache::{ResultCacheGate, fingerprint_of, normalize_input},
};

pub const MAX_FORMATS_PER_REQUEST: usize = OutputFormat::ALL.len();

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    #[error("the generation provider is rate limiting requests")]
    RateLimited,
    #[error("the content was blocked by the provider safety filter")]
    SafetyFiltered,
    #[error("generation timed out")]
    Timeout,
    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerationFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::RateLimited => "generation_rate_limited",
            GenerationFailure::SafetyFiltered => "generation_safety_filtered",
            GenerationFailure::Timeout => "generation_timeout",
            GenerationFailure::Other(_) => "generation_failed",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Identifier stored next to cached outputs.
    fn tag(&self) -> String;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure>;
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn tag(&self) -> String {
        format!("gemini:{}", self.model())
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure> {
        GeminiClient::generate(self, prompt)
            .await
            .map_err(|err| match err {
                GeminiError::RateLimited => GenerationFailure::RateLimited,
                GeminiError::SafetyFiltered => GenerationFailure::SafetyFiltered,
                GeminiError::Timeout => GenerationFailure::Timeout,
                other => GenerationFailure::Other(other.to_string()),
            })
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("too many requests")]
    RateLimited { retry_after_seconds: u64 },
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("your plan does not include: {}", feature_list(.0))]
    PlanDenied(Vec<Feature>),
    #[error("please wait before generating again")]
    CooldownActive { seconds_remaining: u64 },
    #[error("monthly usage limit reached")]
    QuotaExceeded { usage: UsageSnapshot },
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("{format}: {failure}")]
    Generation {
        format: OutputFormat,
        failure: GenerationFailure,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn feature_list(features: &[Feature]) -> String {
    features
        .iter()
        .map(Feature::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl GenerateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerateError::RateLimited { .. } | GenerateError::CooldownActive { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GenerateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GenerateError::Validation(_) => StatusCode::BAD_REQUEST,
            GenerateError::PlanDenied(_) => StatusCode::FORBIDDEN,
            GenerateError::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            GenerateError::Acquisition(err) => err.status_code(),
            GenerateError::Generation { .. } | GenerateError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::RateLimited { .. } => "rate_limited",
            GenerateError::Unauthenticated => "unauthenticated",
            GenerateError::Validation(_) => "validation_error",
            GenerateError::PlanDenied(_) => "plan_denied",
            GenerateError::CooldownActive { .. } => "cooldown_active",
            GenerateError::QuotaExceeded { .. } => "quota_exceeded",
            GenerateError::Acquisition(err) => err.kind(),
            GenerateError::Generation { failure, .. } => failure.kind(),
            GenerateError::Internal(_) => "internal_error",
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, GenerateError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestInput {
    Text(String),
    Url(String),
}

#[derive(Debug, Clone)]
struct ValidatedRequest {
    input: RequestInput,
    context: ResolvedContext,
    formats: Vec<OutputFormat>,
    regenerate: bool,
    save_history: bool,
}

impl ValidatedRequest {
    fn requested_features(&self) -> Vec<Feature> {
        let mut features = Vec::new();
        if matches!(self.input, RequestInput::Url(_)) {
            features.push(Feature::UrlInput);
        }
        if self.regenerate {
            features.push(Feature::Regenerate);
        }
        features
    }
}

fn validate_request(request: GenerateRequest) -> UseCaseResult<ValidatedRequest> {
    if request.formats.is_empty() {
        return Err(GenerateError::Validation(
            "at least one output format is required".to_string(),
        ));
    }
    if request.formats.len() > MAX_FORMATS_PER_REQUEST {
        return Err(GenerateError::Validation(format!(
            "at most {MAX_FORMATS_PER_REQUEST} output formats can be requested"
        )));
    }

    let mut formats = Vec::with_capacity(request.formats.len());
    for raw in &request.formats {
        let format = OutputFormat::from_str(raw)
            .ok_or_else(|| GenerateError::Validation(format!("unknown output format: {raw}")))?;
        if formats.contains(&format) {
            return Err(GenerateError::Validation(format!(
                "duplicate output format: {format}"
            )));
        }
        formats.push(format);
    }

    let input = match request.input_type {
        InputType::Text => request
            .input_text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .map(RequestInput::Text)
            .ok_or_else(|| {
                GenerateError::Validation("inputText is required for text input".to_string())
            })?,
        InputType::Url => request
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(RequestInput::Url)
            .ok_or_else(|| GenerateError::Validation("url is required for url input".to_string()))?,
    };

    let context = request.context.resolve().map_err(GenerateError::Validation)?;

    Ok(ValidatedRequest {
        input,
        context,
        formats,
        regenerate: request.regenerate,
        save_history: request.save_history,
    })
}

struct ProducedOutput {
    format: OutputFormat,
    text: String,
    /// Fingerprint to write once every format succeeded; `None` for cache hits.
    fresh_key: Option<String>,
}

/// Runs the admission gates in order, then serves each format from cache or the generator.
pub struct GenerateUseCase<A, C, R, J, S, G>
where
    A: AccountRepository + Send + Sync + 'static,
    C: CounterStore + Send + Sync + 'static,
    R: ResultCache + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
    S: ContentSource + Send + Sync + 'static,
    G: TextGenerator + Send + Sync + 'static,
{
    throttle: AbuseThrottle<C>,
    identity: IdentityResolver<A>,
    entitlements: EntitlementEvaluator,
    cooldown: CooldownTracker<C>,
    quota: QuotaTracker<A>,
    content: Arc<S>,
    cache: ResultCacheGate<R>,
    jobs: Arc<J>,
    generator: Arc<G>,
    generation_timeout: Duration,
}

impl<A, C, R, J, S, G> GenerateUseCase<A, C, R, J, S, G>
where
    A: AccountRepository + Send + Sync + 'static,
    C: CounterStore + Send + Sync + 'static,
    R: ResultCache + Send + Sync + 'static,
    J: GenerationJobRepository + Send + Sync + 'static,
    S: ContentSource + Send + Sync + 'static,
    G: TextGenerator + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        throttle: AbuseThrottle<C>,
        identity: IdentityResolver<A>,
        entitlements: EntitlementEvaluator,
        cooldown: CooldownTracker<C>,
        quota: QuotaTracker<A>,
        content: Arc<S>,
        cache: ResultCacheGate<R>,
        jobs: Arc<J>,
        generator: Arc<G>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            throttle,
            identity,
            entitlements,
            cooldown,
            quota,
            content,
            cache,
            jobs,
            generator,
            generation_timeout,
        }
    }

    /// `request` is the already-parsed body; a parse failure is reported only after the caller
    /// has been identified.
    pub async fn generate(
        &self,
        client_id: &str,
        credential: Option<&str>,
        request: Result<GenerateRequest, String>,
    ) -> UseCaseResult<GenerateResponse> {
        let throttle = self.throttle.allow(client_id).await;
        if !throttle.allowed {
            return Err(GenerateError::RateLimited {
                retry_after_seconds: throttle.retry_after_seconds,
            });
        }

        let now = Utc::now();
        let account = self
            .identity
            .resolve(credential, now)
            .await
            .map_err(|_| GenerateError::Unauthenticated)?;
        let account_id = account.id;

        let request = validate_request(request.map_err(GenerateError::Validation)?)?;

        let entitlement = self
            .entitlements
            .evaluate(&account, &request.requested_features(), now);
        if entitlement.is_denied() {
            info!(
                %account_id,
                denied = %feature_list(&entitlement.denied_features),
                "generate: plan denied requested features"
            );
            return Err(GenerateError::PlanDenied(entitlement.denied_features));
        }
        let is_paid = entitlement.is_paid;

        let request_id = Uuid::new_v4().to_string();
        let cooldown = self.cooldown.check(account_id, &request_id, is_paid).await;
        if !cooldown.allowed {
            return Err(GenerateError::CooldownActive {
                seconds_remaining: cooldown.seconds_remaining,
            });
        }

        match self.run_admitted(&account, &entitlement, request, now).await {
            Ok(response) => {
                self.cooldown.arm(account_id, &request_id, is_paid).await;
                Ok(response)
            }
            Err(err) => {
                self.cooldown.release(account_id, &request_id, is_paid).await;
                Err(err)
            }
        }
    }

    async fn run_admitted(
        &self,
        account: &AccountEntity,
        entitlement: &Entitlement,
        request: ValidatedRequest,
        now: DateTime<Utc>,
    ) -> UseCaseResult<GenerateResponse> {
        let account_id = account.id;

        let usage = self.quota.check_and_reset(account, now).await?;
        if usage.is_exhausted() {
            info!(
                %account_id,
                usage_count = usage.usage_count,
                usage_limit_monthly = usage.usage_limit_monthly,
                "generate: monthly quota exhausted"
            );
            return Err(GenerateError::QuotaExceeded { usage });
        }

        let (source, source_url) = match &request.input {
            RequestInput::Text(text) => (text.clone(), None),
            RequestInput::Url(url) => (self.content.extract(url).await?, Some(url.clone())),
        };
        let source = truncate_chars(&source, entitlement.max_input_length);
        let normalized = normalize_input(&source);

        let produced = try_join_all(request.formats.iter().map(|format| {
            self.produce(
                *format,
                &source,
                &normalized,
                &request.context,
                request.regenerate,
            )
        }))
        .await?;

        let usage = match self.quota.increment(account, Utc::now()).await? {
            QuotaCharge::Counted(usage) => usage,
            QuotaCharge::Exhausted(usage) => {
                info!(
                    %account_id,
                    usage_count = usage.usage_count,
                    usage_limit_monthly = usage.usage_limit_monthly,
                    "generate: monthly quota spent by a concurrent request"
                );
                return Err(GenerateError::QuotaExceeded { usage });
            }
        };

        // Only a counted request writes fresh outputs to the cache.
        let tag = self.generator.tag();
        for output in &produced {
            if let Some(key) = &output.fresh_key {
                self.cache
                    .store(
                        key,
                        CachedOutput {
                            text: output.text.clone(),
                            generator: tag.clone(),
                        },
                    )
                    .await;
            }
        }

        let mut response = GenerateResponse::default();
        for output in produced {
            let key = output.format.as_str().to_string();
            response
                .from_cache
                .insert(key.clone(), output.fresh_key.is_none());
            response.outputs.insert(key, output.text);
        }

        info!(
            %account_id,
            formats = response.outputs.len(),
            cached = response.from_cache.values().filter(|hit| **hit).count(),
            usage_count = usage.usage_count,
            "generate: request completed"
        );

        if entitlement.is_paid && request.save_history {
            self.record_history(account_id, &request, source, source_url, &response)
                .await;
        }

        Ok(response)
    }

    async fn produce(
        &self,
        format: OutputFormat,
        source: &str,
        normalized: &str,
        context: &ResolvedContext,
        regenerate: bool,
    ) -> UseCaseResult<ProducedOutput> {
        let key = fingerprint_of(normalized, context, format, context.emoji_on, context.tone);

        if !regenerate {
            if let Some(hit) = self.cache.lookup(&key).await {
                return Ok(ProducedOutput {
                    format,
                    text: hit.text,
                    fresh_key: None,
                });
            }
        }

        let prompt = build_prompt(format, source, context);
        let failure = match tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate(&prompt),
        )
        .await
        {
            Ok(Ok(text)) => {
                return Ok(ProducedOutput {
                    format,
                    text,
                    fresh_key: Some(key),
                });
            }
            Ok(Err(failure)) => failure,
            Err(_) => GenerationFailure::Timeout,
        };

        warn!(%format, failure = %failure, "generate: generator call failed");
        Err(GenerateError::Generation { format, failure })
    }

    async fn record_history(
        &self,
        account_id: Uuid,
        request: &ValidatedRequest,
        source: String,
        source_url: Option<String>,
        response: &GenerateResponse,
    ) {
        let job = InsertGenerationJobEntity {
            account_id,
            input_type: match request.input {
                RequestInput::Text(_) => InputType::Text.as_str().to_string(),
                RequestInput::Url(_) => InputType::Url.as_str().to_string(),
            },
            input_text: source,
            source_url,
            formats: request
                .formats
                .iter()
                .map(|format| format.as_str().to_string())
                .collect(),
            context: serde_json::to_value(&request.context).unwrap_or_default(),
            outputs: serde_json::to_value(&response.outputs).unwrap_or_default(),
            created_at: Utc::now(),
        };

        match self.jobs.insert(job).await {
            Ok(job_id) => info!(%account_id, %job_id, "generate: history saved"),
            Err(err) => {
                error!(%account_id, db_error = ?err, "generate: failed to save history")
            }
        }
    }
}
