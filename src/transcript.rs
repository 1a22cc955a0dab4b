//! Transcript data model.
//!
//! Caption payloads are normalized into these shapes at the fetcher boundary,
//! so the rest of the pipeline never sees upstream formats.

use crate::source::Language;
use serde::{Deserialize, Serialize};

/// How the caption track that produced a transcript was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Uploaded by the channel.
    Manual,
    /// Speech recognition in the spoken language.
    AutoGenerated,
    /// Machine translation of another track into the requested language.
    Translated,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Manual => write!(f, "manual"),
            TrackKind::AutoGenerated => write!(f, "auto-generated"),
            TrackKind::Translated => write!(f, "translated"),
        }
    }
}

/// A complete transcript with segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Video ID this transcript belongs to.
    pub video_id: String,
    /// Language that was requested and delivered.
    pub language: Language,
    /// Caption track code actually used (e.g. `en-GB`).
    pub track_code: String,
    /// Kind of caption track actually used.
    pub track_kind: TrackKind,
    /// Individual transcript segments with timestamps, in order.
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Create a new transcript from segments.
    pub fn new(
        video_id: String,
        language: Language,
        track_code: String,
        track_kind: TrackKind,
        segments: Vec<TranscriptSegment>,
    ) -> Self {
        Self {
            video_id,
            language,
            track_code,
            track_kind,
            segments,
        }
    }

    /// Total duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.segments.last().map(|s| s.end_seconds).unwrap_or(0.0)
    }

    /// Plain text of the whole transcript.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Number of words in the transcript.
    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }

    /// Render the transcript as timestamped paragraphs for a prompt.
    ///
    /// Segments are grouped into paragraphs of roughly `paragraph_seconds`,
    /// each prefixed with its start time as `[MM:SS]`.
    pub fn format_for_prompt(&self, paragraph_seconds: f64) -> String {
        let mut out = String::new();
        let mut paragraph = String::new();
        let mut paragraph_start: Option<f64> = None;

        for segment in &self.segments {
            let start = *paragraph_start.get_or_insert(segment.start_seconds);
            if segment.start_seconds - start >= paragraph_seconds && !paragraph.is_empty() {
                push_paragraph(&mut out, start, &paragraph);
                paragraph.clear();
                paragraph_start = Some(segment.start_seconds);
            }
            if !paragraph.is_empty() {
                paragraph.push(' ');
            }
            paragraph.push_str(segment.text.trim());
        }

        if let Some(start) = paragraph_start {
            if !paragraph.is_empty() {
                push_paragraph(&mut out, start, &paragraph);
            }
        }

        out.trim_end().to_string()
    }
}

fn push_paragraph(out: &mut String, start: f64, text: &str) {
    out.push_str(&format!("[{}] {}\n", format_timestamp(start), text));
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Caption text.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
