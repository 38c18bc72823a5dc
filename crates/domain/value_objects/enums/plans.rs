use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FREE_USAGE_LIMIT: i32 = 5;
pub const DEFAULT_CREATOR_USAGE_LIMIT: i32 = 100;

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Creator,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Creator => "creator",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "creator" => Some(Plan::Creator),
            _ => None,
        }
    }

    /// Fallback limit used when a stored row carries no usable limit.
    pub fn default_usage_limit(&self) -> i32 {
        match self {
            Plan::Free => DEFAULT_FREE_USAGE_LIMIT,
            Plan::Creator => DEFAULT_CREATOR_USAGE_LIMIT,
        }
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
