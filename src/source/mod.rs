//! Video sources for Recap.
//!
//! Provides the fetcher traits the pipeline depends on and the YouTube
//! implementation behind them.

mod captions;
mod youtube;

pub use youtube::YoutubeSource;

use crate::error::Result;
use crate::transcript::Transcript;
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Languages a summary can be requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    French,
    German,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Language; 3] = [Language::English, Language::French, Language::German];

    /// ISO 639-1 code used by caption tracks.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::French => "fr",
            Language::German => "de",
        }
    }

    /// Capitalized name used in prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::French => "French",
            Language::German => "German",
        }
    }

    /// Lowercase name, also used as the storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::French => "french",
            Language::German => "german",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "french" | "fr" | "francais" | "français" => Ok(Language::French),
            "german" | "de" | "deutsch" => Ok(Language::German),
            _ => Err(format!("Unsupported language: {} (expected english, french or german)", s)),
        }
    }
}

/// Metadata about a video, normalized from the upstream source.
///
/// Fields the upstream omits are `None`, never zero or empty, so "unknown"
/// stays distinguishable from "zero views".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Platform-assigned video ID.
    pub video_id: String,
    /// Title.
    pub title: Option<String>,
    /// Channel name.
    pub channel: Option<String>,
    /// View count.
    pub view_count: Option<u64>,
    /// Duration in seconds.
    pub duration_seconds: Option<u32>,
    /// Publication date.
    pub published_at: Option<NaiveDate>,
    /// Channel subscriber count.
    pub subscriber_count: Option<u64>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
}

impl VideoMetadata {
    /// Metadata with only the identity known.
    pub fn unknown(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: None,
            channel: None,
            view_count: None,
            duration_seconds: None,
            published_at: None,
            subscriber_count: None,
            thumbnail_url: None,
        }
    }

    /// Watch URL for this video.
    pub fn url(&self) -> String {
        watch_url(&self.video_id)
    }

    /// Watch URL that starts playback at the given offset.
    pub fn url_with_timestamp(&self, seconds: u32) -> String {
        format!("https://youtube.com/watch?v={}&t={}s", self.video_id, seconds)
    }

    /// Title for display.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled video")
    }
}

/// Fetches a transcript for a video in a requested language.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Return the best available caption track in `language`.
    ///
    /// Fails with `NoTranscript`, `VideoUnavailable` or `RateLimited`.
    async fn fetch_transcript(&self, video_id: &str, language: Language) -> Result<Transcript>;
}

/// Fetches video metadata.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Return best-effort metadata. Fails with `VideoUnavailable` or `RateLimited`.
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata>;
}

/// Canonical watch URL for a video ID.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.|m\.)?
                (?:youtube\.com/(?:embed/|v/|shorts/|live/)|youtu\.be/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{1,64})$
        ",
        )
        .expect("video id regex is valid")
    })
}

/// Extract a video ID from a YouTube URL or a bare ID.
///
/// URLs must carry an 11-character ID; bare IDs are accepted as given when
/// they only use ID characters, and the fetchers report unknown ones.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    // watch?v= can sit anywhere in the query string
    if let Ok(url) = url::Url::parse(input) {
        if url.host_str().is_some_and(|h| h.ends_with("youtube.com")) {
            if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
                if is_video_id(&v) {
                    return Some(v.into_owned());
                }
            }
        }
    }

    let caps = video_id_regex().captures(input)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
