use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TonePreset {
    #[default]
    Professional,
    Casual,
    Witty,
    Inspirational,
    Educational,
    Bold,
}

impl TonePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            TonePreset::Professional => "professional",
            TonePreset::Casual => "casual",
            TonePreset::Witty => "witty",
            TonePreset::Inspirational => "inspirational",
            TonePreset::Educational => "educational",
            TonePreset::Bold => "bold",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "professional" => Some(TonePreset::Professional),
            "casual" => Some(TonePreset::Casual),
            "witty" => Some(TonePreset::Witty),
            "inspirational" => Some(TonePreset::Inspirational),
            "educational" => Some(TonePreset::Educational),
            "bold" => Some(TonePreset::Bold),
            _ => None,
        }
    }
}

impl Display for TonePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
