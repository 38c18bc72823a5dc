use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::tone_presets::TonePreset;

pub const MAX_CONTEXT_FIELD_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Url,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Url => "url",
        }
    }
}

/// Optional generation hints supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub target_audience: Option<String>,
    pub goal: Option<String>,
    pub style: Option<String>,
    pub emoji_on: Option<bool>,
    pub tone_preset: Option<String>,
}

/// Context with defaults applied and free text trimmed, ready for prompting and fingerprinting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedContext {
    pub target_audience: String,
    pub goal: String,
    pub style: String,
    pub emoji_on: bool,
    pub tone: TonePreset,
}

impl GenerationContext {
    pub fn resolve(&self) -> Result<ResolvedContext, String> {
        let tone = match self.tone_preset.as_deref().map(str::trim) {
            None | Some("") => TonePreset::default(),
            Some(raw) => {
                TonePreset::from_str(raw).ok_or_else(|| format!("unknown tone preset: {raw}"))?
            }
        };

        Ok(ResolvedContext {
            target_audience: context_field(self.target_audience.as_deref(), "general audience")?,
            goal: context_field(self.goal.as_deref(), "engagement")?,
            style: context_field(self.style.as_deref(), "clear and concise")?,
            emoji_on: self.emoji_on.unwrap_or(false),
            tone,
        })
    }
}

fn context_field(raw: Option<&str>, default: &str) -> Result<String, String> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty());
    match value {
        None => Ok(default.to_string()),
        Some(v) if v.chars().count() > MAX_CONTEXT_FIELD_CHARS => Err(format!(
            "context fields must be at most {MAX_CONTEXT_FIELD_CHARS} characters"
        )),
        Some(v) => Ok(v.split_whitespace().collect::<Vec<_>>().join(" ")),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub input_type: InputType,
    pub input_text: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub context: GenerationContext,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub regenerate: bool,
    #[serde(default)]
    pub save_history: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub outputs: BTreeMap<String, String>,
    pub from_cache: BTreeMap<String, bool>,
}

/// Value stored in the result cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedOutput {
    pub text: String,
    pub generator: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_applies_defaults() {
        let resolved = GenerationContext::default().resolve().unwrap();
        assert_eq!(resolved.tone, TonePreset::Professional);
        assert_eq!(resolved.target_audience, "general audience");
        assert!(!resolved.emoji_on);
    }

    #[test]
    fn resolve_collapses_whitespace_and_reads_tone() {
        let context = GenerationContext {
            target_audience: Some("  indie   hackers ".to_string()),
            tone_preset: Some("Witty".to_string()),
            emoji_on: Some(true),
            ..Default::default()
        };
        let resolved = context.resolve().unwrap();
        assert_eq!(resolved.target_audience, "indie hackers");
        assert_eq!(resolved.tone, TonePreset::Witty);
        assert!(resolved.emoji_on);
    }

    #[test]
    fn resolve_rejects_unknown_tone() {
        let context = GenerationContext {
            tone_preset: Some("sarcastic".to_string()),
            ..Default::default()
        };
        assert!(context.resolve().is_err());
    }

    #[test]
    fn request_deserializes_camel_case() {
        let request: GenerateRequest = serde_json::from_str(
            r#"{"inputType":"url","url":"https://example.com/post","formats":["linkedin_post"],"saveHistory":true}"#,
        )
        .unwrap();
        assert_eq!(request.input_type, InputType::Url);
        assert!(request.save_history);
        assert!(!request.regenerate);
    }
}
