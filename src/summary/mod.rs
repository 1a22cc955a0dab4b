//! Summarization engine.
//!
//! Turns a transcript into a `StructuredSummary`: summary text plus an
//! ordered list of timestamped topics parsed from the model output.

mod chunking;
mod engine;
mod topics;

pub use chunking::{chunk_text, split_sentences};
pub use engine::SummarizationEngine;
pub use topics::{clamp_words, parse_completion, parse_timestamp, sanitize_topics};

use serde::{Deserialize, Serialize};

/// Summary length class. Selects an entry of the length table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    Medium,
    Long,
}

impl SummaryLength {
    pub const ALL: [SummaryLength; 3] = [SummaryLength::Short, SummaryLength::Medium, SummaryLength::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Long => "long",
        }
    }
}

impl std::fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(SummaryLength::Short),
            "medium" => Ok(SummaryLength::Medium),
            "long" => Ok(SummaryLength::Long),
            _ => Err(format!("Unknown summary length: {} (expected short, medium or long)", s)),
        }
    }
}

/// A labeled point or interval in the video timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Short label.
    pub label: String,
    /// Offset from video start in seconds.
    pub start_seconds: u32,
    /// End offset in seconds, when the model gave a range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_seconds: Option<u32>,
}

impl Topic {
    pub fn new(label: impl Into<String>, start_seconds: u32) -> Self {
        Self {
            label: label.into(),
            start_seconds,
            end_seconds: None,
        }
    }

    pub fn with_end(mut self, end_seconds: u32) -> Self {
        self.end_seconds = Some(end_seconds);
        self
    }
}

/// Parsed model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    /// Summary prose.
    pub text: String,
    /// Topics in chronological order; empty when extraction failed.
    pub topics: Vec<Topic>,
}

impl StructuredSummary {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
