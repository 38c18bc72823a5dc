use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    TwitterThread,
    LinkedinPost,
    InstagramCaption,
    FacebookPost,
    TiktokScript,
    Newsletter,
    YoutubeDescription,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::TwitterThread,
        OutputFormat::LinkedinPost,
        OutputFormat::InstagramCaption,
        OutputFormat::FacebookPost,
        OutputFormat::TiktokScript,
        OutputFormat::Newsletter,
        OutputFormat::YoutubeDescription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::TwitterThread => "twitter_thread",
            OutputFormat::LinkedinPost => "linkedin_post",
            OutputFormat::InstagramCaption => "instagram_caption",
            OutputFormat::FacebookPost => "facebook_post",
            OutputFormat::TiktokScript => "tiktok_script",
            OutputFormat::Newsletter => "newsletter",
            OutputFormat::YoutubeDescription => "youtube_description",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(value))
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
