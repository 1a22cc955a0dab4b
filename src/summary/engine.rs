//! Summarization engine.

use super::chunking::chunk_text;
use super::topics::{clamp_words, parse_completion, sanitize_topics};
use super::{StructuredSummary, SummaryLength};
use crate::config::{LengthSpec, Prompts, SummarySettings};
use crate::error::{RecapError, Result};
use crate::llm::{LanguageModel, Prompt};
use crate::source::Language;
use crate::transcript::Transcript;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Rough characters per word used to size chunk summaries.
const CHARS_PER_WORD: usize = 7;

/// Composes prompts, calls the model and parses the result.
pub struct SummarizationEngine {
    llm: Arc<dyn LanguageModel>,
    prompts: Prompts,
    settings: SummarySettings,
}

impl SummarizationEngine {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Prompts, settings: SummarySettings) -> Self {
        Self {
            llm,
            prompts,
            settings,
        }
    }

    /// Summarize a transcript.
    pub async fn summarize(
        &self,
        transcript: &Transcript,
        length: SummaryLength,
        language: Language,
    ) -> Result<StructuredSummary> {
        self.run(transcript, length, language, None).await
    }

    /// Summarize a transcript, forwarding text increments of the final pass.
    ///
    /// The structured parse still happens once, on the assembled text. A
    /// closed receiver does not stop the summary.
    pub async fn summarize_streaming(
        &self,
        transcript: &Transcript,
        length: SummaryLength,
        language: Language,
        tokens: &mpsc::Sender<String>,
    ) -> Result<StructuredSummary> {
        self.run(transcript, length, language, Some(tokens)).await
    }

    #[instrument(skip(self, transcript, tokens), fields(video_id = %transcript.video_id, length = %length, language = %language))]
    async fn run(
        &self,
        transcript: &Transcript,
        length: SummaryLength,
        language: Language,
        tokens: Option<&mpsc::Sender<String>>,
    ) -> Result<StructuredSummary> {
        if transcript.segments.is_empty() {
            return Err(RecapError::NoTranscript(format!(
                "transcript for {} has no segments",
                transcript.video_id
            )));
        }

        let spec = self.prompts.lengths.get(length);
        let body = transcript.format_for_prompt(self.settings.paragraph_seconds);

        let mut vars = self.base_vars(spec, language);
        vars.insert("transcript".to_string(), body.clone());
        let single = Prompt::new(
            self.prompts.summary.system.clone(),
            self.prompts.render_with_custom(&self.prompts.summary.user, &vars),
        );

        let raw = if single.char_len() <= self.settings.max_prompt_chars {
            debug!("Single-pass prompt of {} chars", single.char_len());
            match self.complete(&single, tokens).await {
                Err(RecapError::ContextTooLarge(reason)) => {
                    warn!("Single pass rejected ({}), falling back to chunked summary", reason);
                    // Halve the chunk size so each part is smaller than the rejected prompt
                    let cap = body.chars().count().div_ceil(2);
                    let merged = self.merge_prompt(&body, spec, language, Some(cap)).await?;
                    self.complete(&merged, tokens).await?
                }
                other => other?,
            }
        } else {
            let merged = self.merge_prompt(&body, spec, language, None).await?;
            self.complete(&merged, tokens).await?
        };
        if raw.trim().is_empty() {
            return Err(RecapError::LlmRefused("empty completion".to_string()));
        }

        let parsed = parse_completion(&raw);
        let duration = transcript.duration_seconds().ceil() as u32;
        let topics = sanitize_topics(parsed.topics, Some(duration));

        let mut text = parsed.text;
        let words = text.split_whitespace().count();
        if words > spec.max_words {
            warn!(
                "Summary has {} words, clamping to the {} limit for {}",
                words, spec.max_words, length
            );
            text = clamp_words(&text, spec.max_words);
        } else if words < spec.min_words {
            warn!(
                "Summary has {} words, below the {} word target for {}",
                words, spec.min_words, length
            );
        }

        info!("Summary of {} words with {} topics", text.split_whitespace().count(), topics.len());
        Ok(StructuredSummary { text, topics })
    }

    async fn complete(&self, prompt: &Prompt, tokens: Option<&mpsc::Sender<String>>) -> Result<String> {
        match tokens {
            Some(tx) => self.stream_completion(prompt, tx).await,
            None => self.llm.complete(prompt).await,
        }
    }

    /// Summarize chunks independently and build the merge prompt.
    ///
    /// `chunk_cap` further limits the transcript chars per chunk.
    async fn merge_prompt(
        &self,
        body: &str,
        spec: &LengthSpec,
        language: Language,
        chunk_cap: Option<usize>,
    ) -> Result<Prompt> {
        let mut overhead_vars = self.base_vars(spec, language);
        overhead_vars.insert("transcript".to_string(), String::new());
        overhead_vars.insert("chunk_index".to_string(), "00".to_string());
        overhead_vars.insert("chunk_count".to_string(), "00".to_string());
        overhead_vars.insert("chunk_words".to_string(), "000".to_string());
        let overhead = Prompt::new(
            self.prompts.summary.system.clone(),
            self.prompts.render_with_custom(&self.prompts.chunk.user, &overhead_vars),
        )
        .char_len();

        let budget = self.settings.max_prompt_chars.saturating_sub(overhead);
        let budget = chunk_cap.map_or(budget, |cap| budget.min(cap));
        if budget == 0 {
            return Err(RecapError::ContextTooLarge(format!(
                "prompt budget of {} chars leaves no room for transcript text",
                self.settings.max_prompt_chars
            )));
        }

        let chunks = chunk_text(body, budget);
        if chunks.len() > self.settings.max_chunks {
            return Err(RecapError::ContextTooLarge(format!(
                "transcript needs {} chunks, limit is {}",
                chunks.len(),
                self.settings.max_chunks
            )));
        }

        let count = chunks.len();
        let chunk_words = (self.settings.max_prompt_chars / 2 / (count * CHARS_PER_WORD)).clamp(40, 300);
        info!("Transcript split into {} chunks of up to {} chars", count, budget);

        let summaries: Vec<String> = futures::stream::iter(chunks.into_iter().enumerate())
            .map(|(i, chunk)| {
                let mut vars = self.base_vars(spec, language);
                vars.insert("transcript".to_string(), chunk);
                vars.insert("chunk_index".to_string(), (i + 1).to_string());
                vars.insert("chunk_count".to_string(), count.to_string());
                vars.insert("chunk_words".to_string(), chunk_words.to_string());
                let prompt = Prompt::new(
                    self.prompts.summary.system.clone(),
                    self.prompts.render_with_custom(&self.prompts.chunk.user, &vars),
                );
                async move {
                    let text = self.llm.complete(&prompt).await?;
                    debug!("Chunk {}/{} summarized", i + 1, count);
                    Ok::<_, RecapError>(text.trim().to_string())
                }
            })
            .buffered(self.settings.chunk_concurrency.max(1))
            .try_collect()
            .await?;

        let joined = summaries
            .iter()
            .enumerate()
            .map(|(i, s)| format!("Part {}:\n{}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut vars = self.base_vars(spec, language);
        vars.insert("chunk_summaries".to_string(), joined);
        let prompt = Prompt::new(
            self.prompts.summary.system.clone(),
            self.prompts.render_with_custom(&self.prompts.merge.user, &vars),
        );

        if prompt.char_len() > self.settings.max_prompt_chars {
            return Err(RecapError::ContextTooLarge(format!(
                "merged chunk summaries need {} chars, budget is {}",
                prompt.char_len(),
                self.settings.max_prompt_chars
            )));
        }
        Ok(prompt)
    }

    async fn stream_completion(&self, prompt: &Prompt, tx: &mpsc::Sender<String>) -> Result<String> {
        let mut stream = self.llm.complete_stream(prompt).await?;
        let mut text = String::new();

        while let Some(token) = stream.next().await {
            let token = token?;
            text.push_str(&token);
            // Receiver gone means the caller stopped listening, not that the work should stop
            let _ = tx.send(token).await;
        }
        Ok(text)
    }

    fn base_vars(&self, spec: &LengthSpec, language: Language) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("language".to_string(), language.name().to_string());
        vars.insert("length_instruction".to_string(), spec.instruction.clone());
        vars.insert("min_words".to_string(), spec.min_words.to_string());
        vars.insert("max_words".to_string(), spec.max_words.to_string());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_transcript, FakeModel};

    fn engine(model: Arc<FakeModel>, settings: SummarySettings) -> SummarizationEngine {
        SummarizationEngine::new(model, Prompts::default(), settings)
    }

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| if i % 10 == 9 { "word." } else { "word" })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tokio::test]
    async fn test_single_pass_summary() {
        let model = Arc::new(FakeModel::with_text(
            "Rust is a systems language.\n\nTopics:\n00:00 - Introduction\n00:40 - Ownership",
        ));
        let engine = engine(model.clone(), SummarySettings::default());

        let summary = engine
            .summarize(&sample_transcript("abc123", 12), SummaryLength::Short, Language::English)
            .await
            .unwrap();

        assert_eq!(summary.text, "Rust is a systems language.");
        assert_eq!(summary.topics.len(), 2);
        assert_eq!(summary.topics[1].start_seconds, 40);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.contains("concise"));
        assert!(prompts[0].user.contains("[00:00]"));
        assert!(prompts[0].user.contains("in English"));
    }

    #[tokio::test]
    async fn test_prose_output_yields_empty_topics() {
        let model = Arc::new(FakeModel::with_text("A plain paragraph without any timestamps."));
        let engine = engine(model, SummarySettings::default());

        let summary = engine
            .summarize(&sample_transcript("abc123", 4), SummaryLength::Medium, Language::French)
            .await
            .unwrap();

        assert!(summary.topics.is_empty());
        assert_eq!(summary.text, "A plain paragraph without any timestamps.");
    }

    #[tokio::test]
    async fn test_long_transcript_is_chunked_and_merged() {
        let merged = format!("{}\n\nTopics:\n00:00 - Opening\n05:00 - Middle", words(100));
        let model = Arc::new(FakeModel::new(move |prompt: &Prompt| {
            if prompt.user.contains("Transcript part:") {
                Ok("Chunk summary.".to_string())
            } else {
                Ok(merged.clone())
            }
        }));
        let settings = SummarySettings {
            max_prompt_chars: 2_000,
            ..SummarySettings::default()
        };
        let engine = engine(model.clone(), settings);
        let transcript = sample_transcript("abc123", 120);

        let summary = engine
            .summarize(&transcript, SummaryLength::Short, Language::English)
            .await
            .unwrap();

        let prompts = model.prompts();
        let chunk_calls = prompts.iter().filter(|p| p.user.contains("Transcript part:")).count();
        let merge_calls = prompts.iter().filter(|p| p.user.contains("Part summaries:")).count();
        assert!(chunk_calls >= 2);
        assert_eq!(merge_calls, 1);
        assert_eq!(prompts.len(), chunk_calls + 1);
        assert!(prompts.iter().all(|p| p.char_len() <= 2_000));

        let spec = Prompts::default().lengths.short;
        assert!(summary.word_count() >= spec.min_words && summary.word_count() <= spec.max_words);
        assert_eq!(summary.topics.len(), 2);
        assert_eq!(summary.topics[1].start_seconds, 300);
    }

    #[tokio::test]
    async fn test_rejected_single_pass_falls_back_to_chunks() {
        let model = Arc::new(FakeModel::new(|prompt: &Prompt| {
            if prompt.user.contains("Transcript part:") {
                Ok("Chunk summary.".to_string())
            } else if prompt.user.contains("Part summaries:") {
                Ok("Merged overview.\n\nTopics:\n00:00 - Opening".to_string())
            } else {
                Err(RecapError::ContextTooLarge("context_length_exceeded".to_string()))
            }
        }));
        let engine = engine(model.clone(), SummarySettings::default());

        let summary = engine
            .summarize(&sample_transcript("abc123", 12), SummaryLength::Short, Language::English)
            .await
            .unwrap();

        assert_eq!(summary.text, "Merged overview.");
        assert_eq!(summary.topics.len(), 1);

        let prompts = model.prompts();
        let chunk_calls = prompts.iter().filter(|p| p.user.contains("Transcript part:")).count();
        let merge_calls = prompts.iter().filter(|p| p.user.contains("Part summaries:")).count();
        assert!(chunk_calls >= 2);
        assert_eq!(merge_calls, 1);
        assert_eq!(prompts.len(), chunk_calls + 2);
    }

    #[tokio::test]
    async fn test_rejected_chunks_surface_context_too_large() {
        let model = Arc::new(FakeModel::new(|_| {
            Err(RecapError::ContextTooLarge("context_length_exceeded".to_string()))
        }));
        let engine = engine(model.clone(), SummarySettings::default());

        let err = engine
            .summarize(&sample_transcript("abc123", 12), SummaryLength::Short, Language::English)
            .await
            .unwrap_err();

        assert!(matches!(err, RecapError::ContextTooLarge(_)));
        assert!(model.calls() >= 2);
    }

    #[tokio::test]
    async fn test_too_many_chunks_is_context_too_large() {
        let model = Arc::new(FakeModel::with_text("unused"));
        let settings = SummarySettings {
            max_prompt_chars: 2_000,
            max_chunks: 1,
            ..SummarySettings::default()
        };
        let engine = engine(model.clone(), settings);

        let err = engine
            .summarize(&sample_transcript("abc123", 120), SummaryLength::Long, Language::German)
            .await
            .unwrap_err();

        assert!(matches!(err, RecapError::ContextTooLarge(_)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlong_summary_is_clamped() {
        let model = Arc::new(FakeModel::with_text(&words(500)));
        let engine = engine(model, SummarySettings::default());

        let summary = engine
            .summarize(&sample_transcript("abc123", 4), SummaryLength::Short, Language::English)
            .await
            .unwrap();

        let max = Prompts::default().lengths.short.max_words;
        assert!(summary.word_count() <= max);
        assert!(summary.text.ends_with('.'));
    }

    #[tokio::test]
    async fn test_short_summary_is_kept_below_target() {
        let model = Arc::new(FakeModel::with_text("Too brief."));
        let engine = engine(model, SummarySettings::default());

        let summary = engine
            .summarize(&sample_transcript("abc123", 4), SummaryLength::Long, Language::English)
            .await
            .unwrap();

        assert_eq!(summary.text, "Too brief.");
        assert!(summary.word_count() < Prompts::default().lengths.long.min_words);
    }

    #[tokio::test]
    async fn test_empty_completion_is_refused() {
        let model = Arc::new(FakeModel::with_text("   "));
        let engine = engine(model, SummarySettings::default());

        let err = engine
            .summarize(&sample_transcript("abc123", 4), SummaryLength::Short, Language::English)
            .await
            .unwrap_err();
        assert!(matches!(err, RecapError::LlmRefused(_)));
    }

    #[tokio::test]
    async fn test_streaming_forwards_tokens_and_parses_once() {
        let raw = "Streaming works well.\n\nTopics:\n00:10 - Start";
        let model = Arc::new(FakeModel::with_text(raw));
        let engine = engine(model, SummarySettings::default());
        let (tx, mut rx) = mpsc::channel(64);

        let summary = engine
            .summarize_streaming(
                &sample_transcript("abc123", 4),
                SummaryLength::Short,
                Language::English,
                &tx,
            )
            .await
            .unwrap();
        drop(tx);

        let mut streamed = String::new();
        let mut increments = 0;
        while let Some(token) = rx.recv().await {
            streamed.push_str(&token);
            increments += 1;
        }

        assert!(increments > 1);
        assert_eq!(streamed, raw);
        assert_eq!(summary.text, "Streaming works well.");
        assert_eq!(summary.topics.len(), 1);
    }
}
