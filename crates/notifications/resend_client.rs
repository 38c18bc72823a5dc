use anyhow::Result;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::error;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Minimal Resend client built on reqwest.
pub struct ResendClient {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

impl ResendClient {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from,
        }
    }

    /// Sends a plain-text email and returns the provider message id.
    pub async fn send_email(&self, to: &str, subject: &str, text: &str) -> Result<Option<String>> {
        let body = SendEmailRequest {
            from: &self.from,
            to: [to],
            subject,
            text,
        };

        let resp = self
            .http
            .post(RESEND_API_URL)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = match resp.text().await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => "<empty response body>".to_string(),
                Err(err) => format!("<failed to read response body: {err}>"),
            };

            error!(
                status = %status,
                response_body = %body,
                "resend: send email request failed"
            );
            anyhow::bail!("Resend API request failed (status {status})");
        }

        let parsed: SendEmailResponse = resp.json().await?;
        Ok(parsed.id)
    }
}
