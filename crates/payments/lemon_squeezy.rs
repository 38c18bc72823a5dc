use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::subscription_statuses::SubscriptionStatus, subscription_events::SubscriptionEvent,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Deserialize)]
pub struct LemonSqueezyWebhook {
    pub meta: WebhookMeta,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMeta {
    pub event_name: String,
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub custom_data: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub attributes: WebhookAttributes,
}

/// Union of the subscription and subscription-invoice attribute sets this service reads.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookAttributes {
    pub status: Option<String>,
    pub customer_id: Option<serde_json::Value>,
    pub variant_id: Option<serde_json::Value>,
    pub subscription_id: Option<serde_json::Value>,
    pub user_email: Option<String>,
    pub renews_at: Option<String>,
    pub ends_at: Option<String>,
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`, as sent in `x-signature`.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of `signature_header` against the raw body.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    let Ok(provided) = hex::decode(signature_header.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// Parses an already verified body into the provider-neutral event.
pub fn parse_event(payload: &[u8]) -> Result<SubscriptionEvent> {
    let webhook: LemonSqueezyWebhook =
        serde_json::from_slice(payload).context("invalid webhook payload")?;

    let event_id = webhook
        .meta
        .webhook_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| hex::encode(Sha256::digest(payload)));

    let attributes = &webhook.data.attributes;
    let status = attributes
        .status
        .as_deref()
        .and_then(SubscriptionStatus::from_str);

    let is_invoice = webhook.data.type_.as_deref() == Some("subscription-invoices");
    let subscription_id = if is_invoice {
        attributes.subscription_id.as_ref().and_then(id_string)
    } else {
        webhook.data.id.as_ref().and_then(id_string)
    };

    let account_hint = webhook
        .meta
        .custom_data
        .as_ref()
        .and_then(|custom| custom.get("user_id"))
        .and_then(|value| value.as_str())
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    Ok(SubscriptionEvent {
        event_id,
        event_name: webhook.meta.event_name.clone(),
        subscription_id,
        customer_id: attributes.customer_id.as_ref().and_then(id_string),
        account_hint,
        email: attributes
            .user_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_ascii_lowercase),
        variant_id: attributes.variant_id.as_ref().and_then(id_string),
        status: if is_invoice { None } else { status },
        period_end: period_end(status, attributes),
    })
}

fn period_end(
    status: Option<SubscriptionStatus>,
    attributes: &WebhookAttributes,
) -> Option<DateTime<Utc>> {
    let renews_at = attributes.renews_at.as_deref().and_then(parse_timestamp);
    let ends_at = attributes.ends_at.as_deref().and_then(parse_timestamp);

    match status {
        Some(SubscriptionStatus::Cancelled) | Some(SubscriptionStatus::Expired) => {
            ends_at.or(renews_at)
        }
        _ => renews_at.or(ends_at),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Provider ids arrive as numbers or strings depending on the object.
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
