use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use crates::domain::value_objects::{entitlements::Feature, usage::UsageSnapshot};
use serde::Serialize;
use tracing::error;

use crate::usecases::{account::AccountError, billing_webhook::WebhookError, generate::GenerateError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: u16,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_features: Option<Vec<Feature>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSnapshot>,
}

impl ErrorResponse {
    fn new(status: StatusCode, error: &'static str, message: String) -> Self {
        Self {
            code: status.as_u16(),
            error,
            message,
            seconds_remaining: None,
            retry_after_seconds: None,
            denied_features: None,
            usage: None,
        }
    }
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        let message = match &self {
            GenerateError::Internal(err) => {
                // Don't leak internal error detail to client
                error!(error = ?err, "generate: request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        let mut body = ErrorResponse::new(status, kind, message);

        let mut retry_after = None;
        match self {
            GenerateError::RateLimited {
                retry_after_seconds,
            } => {
                body.retry_after_seconds = Some(retry_after_seconds);
                retry_after = Some(retry_after_seconds);
            }
            GenerateError::CooldownActive { seconds_remaining } => {
                body.seconds_remaining = Some(seconds_remaining);
            }
            GenerateError::PlanDenied(features) => body.denied_features = Some(features),
            GenerateError::QuotaExceeded { usage } => body.usage = Some(usage),
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            WebhookError::InvalidSignature => "Invalid signature".to_string(),
            WebhookError::NotificationFailed(_) => self.to_string(),
            WebhookError::Internal(err) => {
                error!(error = ?err, "billing_webhook: delivery failed");
                INTERNAL_MESSAGE.to_string()
            }
        };

        (status, Json(ErrorResponse::new(status, self.kind(), message))).into_response()
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AccountError::Unauthenticated => self.to_string(),
            AccountError::Internal(err) => {
                error!(error = ?err, "account: request failed");
                INTERNAL_MESSAGE.to_string()
            }
        };

        (status, Json(ErrorResponse::new(status, self.kind(), message))).into_response()
    }
}
