use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("generation provider is rate limiting requests")]
    RateLimited,
    #[error("generation was blocked by the provider safety filter")]
    SafetyFiltered,
    #[error("generation timed out")]
    Timeout,
    #[error("generation provider returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("generation provider returned no text")]
    EmptyResponse,
    #[error("generation request failed: {0}")]
    Transport(String),
}

/// Minimal Gemini `generateContent` client built on reqwest.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: Option<String>,
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, GeminiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GeminiError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.8,
                max_output_tokens: 2048,
            },
        };

        let resp = self
            .http
            .post(format!("{GEMINI_API_BASE}/{}:generateContent", self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let resp = Self::ensure_success(resp).await?;
        let parsed: GenerateContentResponse = resp.json().await.map_err(map_transport_error)?;
        extract_text(parsed)
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, GeminiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (provider_status, provider_message) =
            match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => (envelope.error.status, envelope.error.message),
                Err(_) => (None, None),
            };

        error!(
            status = %status,
            provider_status = ?provider_status,
            provider_message = ?provider_message,
            "gemini: generateContent request failed"
        );

        if status.as_u16() == 429 || provider_status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return Err(GeminiError::RateLimited);
        }
        if status.as_u16() == 504 || provider_status.as_deref() == Some("DEADLINE_EXCEEDED") {
            return Err(GeminiError::Timeout);
        }

        Err(GeminiError::Api {
            status: status.as_u16(),
            message: provider_message.unwrap_or_else(|| status.to_string()),
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> GeminiError {
    if err.is_timeout() {
        GeminiError::Timeout
    } else {
        GeminiError::Transport(err.to_string())
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GeminiError> {
    if response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
        .is_some()
    {
        return Err(GeminiError::SafetyFiltered);
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(GeminiError::EmptyResponse);
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let text = text.trim();

    if text.is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                Err(GeminiError::SafetyFiltered)
            }
            _ => Err(GeminiError::EmptyResponse),
        };
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn joins_candidate_parts() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "1/ Hello " }, { "text": "world\n" }] },
                "finishReason": "STOP"
            }]
        }));

        assert_eq!(extract_text(response).unwrap(), "1/ Hello world");
    }

    #[test]
    fn blocked_prompt_is_safety_filtered() {
        let response = parse(serde_json::json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        }));

        assert!(matches!(
            extract_text(response),
            Err(GeminiError::SafetyFiltered)
        ));
    }

    #[test]
    fn empty_candidate_with_safety_finish_is_safety_filtered() {
        let response = parse(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }));

        assert!(matches!(
            extract_text(response),
            Err(GeminiError::SafetyFiltered)
        ));
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let response = parse(serde_json::json!({}));
        assert!(matches!(
            extract_text(response),
            Err(GeminiError::EmptyResponse)
        ));
    }
}
