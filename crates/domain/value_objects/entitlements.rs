use serde::Serialize;

/// Features a generation request can ask for beyond the free baseline.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    UrlInput,
    Regenerate,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::UrlInput => "url_input",
            Feature::Regenerate => "regenerate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub free_usage_limit: i32,
    pub creator_usage_limit: i32,
    pub free_max_input_chars: usize,
    pub creator_max_input_chars: usize,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free_usage_limit: 5,
            creator_usage_limit: 100,
            free_max_input_chars: 5_000,
            creator_max_input_chars: 20_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub is_paid: bool,
    pub max_input_length: usize,
    pub denied_features: Vec<Feature>,
}

impl Entitlement {
    pub fn is_denied(&self) -> bool {
        !self.denied_features.is_empty()
    }
}
