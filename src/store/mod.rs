//! Summary store for Recap.
//!
//! Maps a (video id, language, length) key to at most one summary record,
//! alongside one metadata row per video.

mod memory;
mod sqlite;

pub use memory::MemorySummaryStore;
pub use sqlite::SqliteSummaryStore;

use crate::config::Settings;
use crate::error::{RecapError, Result};
use crate::source::{Language, VideoMetadata};
use crate::summary::{StructuredSummary, SummaryLength, Topic};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Composite identity of a summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryKey {
    pub video_id: String,
    pub language: Language,
    pub length: SummaryLength,
}

impl SummaryKey {
    pub fn new(video_id: impl Into<String>, language: Language, length: SummaryLength) -> Self {
        Self {
            video_id: video_id.into(),
            language,
            length,
        }
    }
}

impl std::fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.video_id, self.language, self.length)
    }
}

/// A persisted summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub video_id: String,
    pub language: Language,
    pub length: SummaryLength,
    pub summary_text: String,
    /// Topics in chronological order.
    pub topics: Vec<Topic>,
    /// Raw transcript text, when kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// User-assigned tags; the only field that changes after creation.
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl SummaryRecord {
    /// Build a fresh record for `key`.
    pub fn new(
        key: &SummaryKey,
        summary: StructuredSummary,
        transcript: Option<String>,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            video_id: key.video_id.clone(),
            language: key.language,
            length: key.length,
            summary_text: summary.text,
            topics: summary.topics,
            transcript,
            tags,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> SummaryKey {
        SummaryKey::new(self.video_id.clone(), self.language, self.length)
    }
}

/// A summary together with its video's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub video: VideoMetadata,
    pub summary: SummaryRecord,
}

/// Outcome of a persist call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// The record was written.
    Created,
    /// A record with the same key already existed and was left untouched.
    AlreadyExists,
}

/// Trait for summary store implementations.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Summary for a key, if one exists.
    async fn lookup(&self, key: &SummaryKey) -> Result<Option<SummaryRecord>>;

    /// Upsert the video row and insert the summary unless its key exists.
    async fn persist(&self, video: &VideoMetadata, record: &SummaryRecord) -> Result<Persisted>;

    /// Summary with its video metadata.
    async fn get(&self, key: &SummaryKey) -> Result<Option<CatalogEntry>>;

    /// All summaries, most recently created first.
    async fn list(&self) -> Result<Vec<CatalogEntry>>;

    /// Case-insensitive substring search over title, channel, summary text
    /// and tags, restricted to entries carrying every tag in `tags`.
    /// Most recently created first.
    async fn search(&self, query: &str, tags: &BTreeSet<String>) -> Result<Vec<CatalogEntry>>;

    /// Replace the tag set of a summary. Fails with `NotFound` for unknown keys.
    async fn update_tags(&self, key: &SummaryKey, tags: BTreeSet<String>) -> Result<SummaryRecord>;

    /// Remove a video and all its summaries. Returns the number of summaries removed.
    async fn delete_video(&self, video_id: &str) -> Result<usize>;

    /// Stored metadata for a video.
    async fn get_video(&self, video_id: &str) -> Result<Option<VideoMetadata>>;
}

/// Trim tags and drop empty ones.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Search predicate shared by all stores.
pub fn matches(entry: &CatalogEntry, query: &str, tags: &BTreeSet<String>) -> bool {
    let has_tags = tags.iter().all(|wanted| {
        entry
            .summary
            .tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(wanted))
    });
    if !has_tags {
        return false;
    }

    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    let contains = |s: &str| s.to_lowercase().contains(&query);
    entry.video.title.as_deref().is_some_and(contains)
        || entry.video.channel.as_deref().is_some_and(contains)
        || contains(&entry.summary.summary_text)
        || entry.summary.tags.iter().any(|t| contains(t))
}

/// Order entries most recently created first, ties broken by key.
pub fn sort_recent_first(entries: &mut [CatalogEntry]) {
    entries.sort_by(|a, b| {
        b.summary
            .created_at
            .cmp(&a.summary.created_at)
            .then_with(|| a.summary.key().cmp(&b.summary.key()))
    });
}

/// Open the configured store.
pub fn open_store(settings: &Settings) -> Result<Arc<dyn SummaryStore>> {
    match settings.store.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteSummaryStore::new(&settings.sqlite_path())?)),
        "memory" => Ok(Arc::new(MemorySummaryStore::new())),
        other => Err(RecapError::Config(format!(
            "Unknown store provider: {} (expected sqlite or memory)",
            other
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn record(video_id: &str, text: &str, tags: &[&str], age_minutes: i64) -> SummaryRecord {
        let key = SummaryKey::new(video_id, Language::English, SummaryLength::Short);
        let mut record = SummaryRecord::new(
            &key,
            StructuredSummary {
                text: text.to_string(),
                topics: vec![Topic::new("Intro", 0), Topic::new("Body", 65).with_end(120)],
            },
            Some("[00:00] transcript".to_string()),
            normalize_tags(tags),
        );
        record.created_at = Utc::now() - Duration::minutes(age_minutes);
        record
    }

    pub(crate) fn video(video_id: &str, title: &str, channel: &str) -> VideoMetadata {
        VideoMetadata {
            title: Some(title.to_string()),
            channel: Some(channel.to_string()),
            view_count: Some(0),
            ..VideoMetadata::unknown(video_id)
        }
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(["  rust ", "", "async", "rust"]);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["async", "rust"]);
    }

    #[test]
    fn test_matches() {
        let entry = CatalogEntry {
            video: video("v1", "Async Rust Explained", "Tokio Talks"),
            summary: record("v1", "Covers futures and executors.", &["Programming"], 0),
        };
        let none = BTreeSet::new();

        assert!(matches(&entry, "async rust", &none));
        assert!(matches(&entry, "TOKIO", &none));
        assert!(matches(&entry, "executors", &none));
        assert!(matches(&entry, "gramm", &none));
        assert!(matches(&entry, "", &none));
        assert!(!matches(&entry, "python", &none));

        assert!(matches(&entry, "", &normalize_tags(["programming"])));
        assert!(!matches(&entry, "", &normalize_tags(["programming", "music"])));
    }

    #[test]
    fn test_key_display() {
        let key = SummaryKey::new("abc123", Language::German, SummaryLength::Long);
        assert_eq!(key.to_string(), "abc123/german/long");
    }
}
