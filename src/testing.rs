//! In-crate fakes of the capability traits for unit tests.

use crate::error::{RecapError, Result};
use crate::llm::{LanguageModel, Prompt, TextStream};
use crate::source::{Language, MetadataFetcher, TranscriptFetcher, VideoMetadata};
use crate::transcript::{TrackKind, Transcript, TranscriptSegment};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&Prompt) -> Result<String> + Send + Sync>;

/// Language model that answers from a closure and records every prompt.
pub struct FakeModel {
    respond: Responder,
    prompts: Mutex<Vec<Prompt>>,
    delay: Duration,
}

impl FakeModel {
    pub fn new(respond: impl Fn(&Prompt) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_text(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    async fn answer(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(prompt)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let text = self.answer(prompt).await?;
        if text.trim().is_empty() {
            return Err(RecapError::LlmRefused("empty completion".to_string()));
        }
        Ok(text)
    }

    async fn complete_stream(&self, prompt: &Prompt) -> Result<TextStream> {
        let text = self.answer(prompt).await?;
        let tokens: Vec<Result<String>> = text.split_inclusive(' ').map(|t| Ok(t.to_string())).collect();
        Ok(futures::stream::iter(tokens).boxed())
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

/// Transcript of `segments` ten-second captions.
pub fn sample_transcript(video_id: &str, segments: usize) -> Transcript {
    let segments = (0..segments)
        .map(|i| {
            let start = i as f64 * 10.0;
            TranscriptSegment::new(
                start,
                start + 10.0,
                format!("Sentence number {} about the subject.", i),
            )
        })
        .collect();
    Transcript::new(
        video_id.to_string(),
        Language::English,
        "en".to_string(),
        TrackKind::Manual,
        segments,
    )
}

/// Scripted transcript and metadata source.
pub struct FakeSource {
    segments: usize,
    has_transcript: bool,
    unavailable: bool,
    transcript_delays: Mutex<VecDeque<Duration>>,
    transcript_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            segments: 12,
            has_transcript: true,
            unavailable: false,
            transcript_delays: Mutex::new(VecDeque::new()),
            transcript_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
        }
    }

    /// Every video is private.
    pub fn private() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    /// Videos have no captions.
    pub fn without_captions() -> Self {
        Self {
            has_transcript: false,
            ..Self::new()
        }
    }

    /// Delay successive transcript fetches by the given durations.
    pub fn with_transcript_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        *self.transcript_delays.lock().unwrap() = delays.into_iter().collect();
        self
    }

    pub fn transcript_calls(&self) -> usize {
        self.transcript_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptFetcher for FakeSource {
    async fn fetch_transcript(&self, video_id: &str, language: Language) -> Result<Transcript> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.transcript_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable {
            return Err(RecapError::VideoUnavailable(format!("{} is private", video_id)));
        }
        if !self.has_transcript {
            return Err(RecapError::NoTranscript(format!("{} has no captions", video_id)));
        }

        let mut transcript = sample_transcript(video_id, self.segments);
        transcript.language = language;
        Ok(transcript)
    }
}

#[async_trait]
impl MetadataFetcher for FakeSource {
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RecapError::VideoUnavailable(format!("{} is private", video_id)));
        }

        Ok(VideoMetadata {
            title: Some(format!("Video {}", video_id)),
            channel: Some("Test Channel".to_string()),
            view_count: Some(42),
            duration_seconds: Some(self.segments as u32 * 10),
            ..VideoMetadata::unknown(video_id)
        })
    }
}
