use std::sync::Arc;

use crates::domain::{
    repositories::result_cache::ResultCache,
    value_objects::{
        enums::{output_formats::OutputFormat, tone_presets::TonePreset},
        generation::{CachedOutput, ResolvedContext},
    },
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

const FINGERPRINT_VERSION: u8 = 1;

#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: u8,
    input: &'a str,
    target_audience: &'a str,
    goal: &'a str,
    style: &'a str,
    format: OutputFormat,
    emoji_on: bool,
    tone: TonePreset,
}

/// Whitespace-insensitive form of the source text used for fingerprinting.
pub fn normalize_input(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 over a canonical JSON encoding of the generation inputs, hex encoded.
pub fn fingerprint_of(
    normalized_input: &str,
    context: &ResolvedContext,
    format: OutputFormat,
    emoji_on: bool,
    tone: TonePreset,
) -> String {
    let canonical = FingerprintInput {
        version: FINGERPRINT_VERSION,
        input: normalized_input,
        target_audience: &context.target_audience,
        goal: &context.goal,
        style: &context.style,
        format,
        emoji_on,
        tone,
    };

    // Field order is fixed by the struct, so the encoding is stable.
    let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(&encoded))
}

/// Advisory wrapper: store failures only cost the optimization, never the request.
pub struct ResultCacheGate<R>
where
    R: ResultCache + Send + Sync + 'static,
{
    cache: Arc<R>,
}

impl<R> ResultCacheGate<R>
where
    R: ResultCache + Send + Sync + 'static,
{
    pub fn new(cache: Arc<R>) -> Self {
        Self { cache }
    }

    pub async fn lookup(&self, key: &str) -> Option<CachedOutput> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(cache_key = key, error = ?err, "result_cache: lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn store(&self, key: &str, output: CachedOutput) {
        if let Err(err) = self.cache.put(key, output).await {
            warn!(cache_key = key, error = ?err, "result_cache: store failed");
        }
    }
}
