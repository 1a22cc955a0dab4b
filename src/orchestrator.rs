//! Pipeline orchestrator for Recap.
//!
//! Sequences cache check, transcript and metadata fetch, summarization and
//! persistence for one (video, language, length) request. Concurrent
//! requests for the same key share a single in-flight computation.

use crate::config::{PipelineSettings, Prompts, Settings};
use crate::error::{RecapError, Result};
use crate::llm::create_model;
use crate::source::{parse_video_id, Language, MetadataFetcher, TranscriptFetcher, YoutubeSource};
use crate::store::{normalize_tags, open_store, Persisted, SummaryKey, SummaryRecord, SummaryStore};
use crate::summary::{StructuredSummary, SummarizationEngine, SummaryLength};
use crate::transcript::Transcript;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Buffer between the model stream and the event channel.
const TOKEN_BUFFER: usize = 64;

/// Where a request is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    CacheCheck,
    /// Served from the store.
    CacheHit,
    /// Waiting on an identical request already in flight.
    Coalesced,
    FetchingTranscript,
    FetchingMetadata,
    Summarizing,
    Persisting,
    Done,
    Failed(String),
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Received => write!(f, "received"),
            PipelineStage::CacheCheck => write!(f, "checking cache"),
            PipelineStage::CacheHit => write!(f, "cache hit"),
            PipelineStage::Coalesced => write!(f, "waiting for identical request"),
            PipelineStage::FetchingTranscript => write!(f, "fetching transcript"),
            PipelineStage::FetchingMetadata => write!(f, "fetching metadata"),
            PipelineStage::Summarizing => write!(f, "summarizing"),
            PipelineStage::Persisting => write!(f, "saving"),
            PipelineStage::Done => write!(f, "done"),
            PipelineStage::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Progress notification for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Stage(PipelineStage),
    /// Text increment of the final summarization pass.
    Token(String),
}

/// Timeouts and retry policy applied to each stage attempt.
#[derive(Debug, Clone)]
pub struct StagePolicy {
    pub fetch_timeout: Duration,
    pub llm_timeout: Duration,
    /// Attempts per stage, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&PipelineSettings> for StagePolicy {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            fetch_timeout: settings.fetch_timeout(),
            llm_timeout: settings.llm_timeout(),
            attempts: settings.retry_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_delay: Duration::from_millis(settings.retry_max_delay_ms),
        }
    }
}

impl StagePolicy {
    /// Delay before retry number `attempt` (1-based): doubling, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

type Outcome = Option<std::result::Result<SummaryRecord, Arc<RecapError>>>;

/// Registry of in-progress computations, one per key.
#[derive(Clone, Default)]
struct InFlight {
    entries: Arc<Mutex<HashMap<SummaryKey, watch::Receiver<Outcome>>>>,
}

enum Slot {
    Leader(watch::Sender<Outcome>, watch::Receiver<Outcome>),
    Follower(watch::Receiver<Outcome>),
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<SummaryKey, watch::Receiver<Outcome>>> {
        // Entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn join(&self, key: &SummaryKey) -> Slot {
        let mut entries = self.lock();
        if let Some(rx) = entries.get(key) {
            return Slot::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        entries.insert(key.clone(), rx.clone());
        Slot::Leader(tx, rx)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes the registry entry when the computation ends, including by panic.
struct Registration {
    registry: InFlight,
    key: SummaryKey,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

/// The main orchestrator for the Recap pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    transcripts: Arc<dyn TranscriptFetcher>,
    metadata: Arc<dyn MetadataFetcher>,
    engine: Arc<SummarizationEngine>,
    store: Arc<dyn SummaryStore>,
    policy: StagePolicy,
    languages: Vec<Language>,
    store_transcript: bool,
    paragraph_seconds: f64,
    in_flight: InFlight,
}

impl Orchestrator {
    /// Create an orchestrator from configuration.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let llm = create_model(&settings.llm)?;
        info!("Using {} model {}", settings.llm.provider, llm.model_name());

        let engine = SummarizationEngine::new(llm, prompts, settings.summary.clone());
        let source = Arc::new(YoutubeSource::with_settings(&settings.youtube));
        let store = open_store(settings)?;

        Ok(Self::with_components(
            source.clone(),
            source,
            engine,
            store,
            settings,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        transcripts: Arc<dyn TranscriptFetcher>,
        metadata: Arc<dyn MetadataFetcher>,
        engine: SummarizationEngine,
        store: Arc<dyn SummaryStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            transcripts,
            metadata,
            engine: Arc::new(engine),
            store,
            policy: StagePolicy::from(&settings.pipeline),
            languages: settings.youtube.languages.clone(),
            store_transcript: settings.summary.store_transcript,
            paragraph_seconds: settings.summary.paragraph_seconds,
            in_flight: InFlight::default(),
        }
    }

    /// Override the stage timeouts and retry policy.
    pub fn with_policy(mut self, policy: StagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get a reference to the summary store.
    pub fn store(&self) -> Arc<dyn SummaryStore> {
        self.store.clone()
    }

    /// Summarize a video, or return the stored summary for the same key.
    pub async fn process_video(
        &self,
        input: &str,
        language: Language,
        length: SummaryLength,
        tags: &[String],
    ) -> Result<SummaryRecord> {
        self.run(input, language, length, tags, None).await
    }

    /// Like [`process_video`](Self::process_video), reporting stages and
    /// summary text increments on `events`.
    pub async fn process_video_with_events(
        &self,
        input: &str,
        language: Language,
        length: SummaryLength,
        tags: &[String],
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<SummaryRecord> {
        self.run(input, language, length, tags, Some(events)).await
    }

    #[instrument(skip(self, tags, events))]
    async fn run(
        &self,
        input: &str,
        language: Language,
        length: SummaryLength,
        tags: &[String],
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<SummaryRecord> {
        emit(&events, PipelineStage::Received).await;

        let result = self.resolve(input, language, length, tags, &events).await;
        match &result {
            Ok(_) => emit(&events, PipelineStage::Done).await,
            Err(e) => {
                warn!("Request failed: {}", e);
                emit(&events, PipelineStage::Failed(e.to_string())).await;
            }
        }
        result
    }

    async fn resolve(
        &self,
        input: &str,
        language: Language,
        length: SummaryLength,
        tags: &[String],
        events: &Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<SummaryRecord> {
        let video_id = parse_video_id(input)
            .ok_or_else(|| RecapError::InvalidInput(format!("Could not parse video id from: {}", input)))?;
        if !self.languages.contains(&language) {
            return Err(RecapError::InvalidInput(format!("Language {} is not enabled", language)));
        }

        let key = SummaryKey::new(video_id, language, length);
        let tags = normalize_tags(tags);

        emit(events, PipelineStage::CacheCheck).await;
        if let Some(record) = self.store.lookup(&key).await? {
            info!("Cache hit for {}", key);
            emit(events, PipelineStage::CacheHit).await;
            return self.merge_tags(record, &tags).await;
        }

        let rx = match self.in_flight.join(&key) {
            Slot::Leader(tx, rx) => {
                debug!("Starting computation for {}", key);
                self.spawn_computation(key.clone(), tags.clone(), events.clone(), tx);
                rx
            }
            Slot::Follower(rx) => {
                info!("Joining in-flight computation for {}", key);
                emit(events, PipelineStage::Coalesced).await;
                rx
            }
        };

        let record = wait_for_outcome(rx).await?;
        self.merge_tags(record, &tags).await
    }

    /// Run the computation on its own task so it finishes and fills the
    /// store even if every caller goes away.
    fn spawn_computation(
        &self,
        key: SummaryKey,
        tags: BTreeSet<String>,
        events: Option<mpsc::Sender<PipelineEvent>>,
        tx: watch::Sender<Outcome>,
    ) {
        let this = self.clone();
        let registration = Registration {
            registry: self.in_flight.clone(),
            key: key.clone(),
        };

        tokio::spawn(async move {
            let _registration = registration;
            let outcome = this.compute(&key, tags, events).await.map_err(Arc::new);
            tx.send_replace(Some(outcome));
        });
    }

    #[instrument(skip(self, key, tags, events), fields(video_id = %key.video_id, language = %key.language, length = %key.length))]
    async fn compute(
        &self,
        key: &SummaryKey,
        tags: BTreeSet<String>,
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<SummaryRecord> {
        // A computation that finished between the caller's lookup and registration
        if let Some(record) = self.store.lookup(key).await? {
            debug!("{} appeared in the store before computing", key);
            return Ok(record);
        }

        emit(&events, PipelineStage::FetchingTranscript).await;
        emit(&events, PipelineStage::FetchingMetadata).await;
        let (transcript, metadata) = tokio::try_join!(
            self.with_retry("transcript fetch", self.policy.fetch_timeout, || {
                self.transcripts.fetch_transcript(&key.video_id, key.language)
            }),
            self.with_retry("metadata fetch", self.policy.fetch_timeout, || {
                self.metadata.fetch_metadata(&key.video_id)
            }),
        )?;
        info!(
            "Fetched {} transcript ({} segments) for {}",
            transcript.track_kind,
            transcript.segments.len(),
            metadata.display_title()
        );

        emit(&events, PipelineStage::Summarizing).await;
        let summary = self
            .with_retry("summarization", self.policy.llm_timeout, || {
                self.summarize(&transcript, key, &events)
            })
            .await?;

        emit(&events, PipelineStage::Persisting).await;
        let transcript_text = self
            .store_transcript
            .then(|| transcript.format_for_prompt(self.paragraph_seconds));
        let record = SummaryRecord::new(key, summary, transcript_text, tags.clone());

        match self.store.persist(&metadata, &record).await? {
            Persisted::Created => Ok(record),
            Persisted::AlreadyExists => {
                info!("{} was stored concurrently, returning stored record", key);
                self.store
                    .lookup(key)
                    .await?
                    .ok_or_else(|| RecapError::Store(format!("{} vanished after a conflict", key)))
            }
        }
    }

    async fn summarize(
        &self,
        transcript: &Transcript,
        key: &SummaryKey,
        events: &Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<StructuredSummary> {
        let Some(events) = events else {
            return self.engine.summarize(transcript, key.length, key.language).await;
        };

        let (tx, mut rx) = mpsc::channel::<String>(TOKEN_BUFFER);
        let forward = events.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(token) = rx.recv().await {
                if forward.send(PipelineEvent::Token(token)).await.is_err() {
                    break;
                }
            }
        });

        let result = self
            .engine
            .summarize_streaming(transcript, key.length, key.language, &tx)
            .await;
        drop(tx);
        let _ = forwarder.await;
        result
    }

    /// Run `op` with a timeout per attempt, retrying transient failures
    /// with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, stage: &str, timeout: Duration, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(RecapError::Timeout(format!(
                    "{} took longer than {:?}",
                    stage, timeout
                ))),
            };

            match result {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {}. Retrying in {:?}",
                        stage, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Add requested tags to an existing record.
    async fn merge_tags(&self, record: SummaryRecord, tags: &BTreeSet<String>) -> Result<SummaryRecord> {
        if tags.is_subset(&record.tags) {
            return Ok(record);
        }
        let merged: BTreeSet<String> = record.tags.union(tags).cloned().collect();
        debug!("Adding tags to {}", record.key());
        self.store.update_tags(&record.key(), merged).await
    }

    /// Number of computations currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

async fn wait_for_outcome(mut rx: watch::Receiver<Outcome>) -> Result<SummaryRecord> {
    let outcome = rx
        .wait_for(|outcome| outcome.is_some())
        .await
        .map_err(|_| RecapError::Internal("summary task ended without a result".to_string()))?
        .clone();

    match outcome {
        Some(Ok(record)) => Ok(record),
        Some(Err(shared)) => Err(shared.into()),
        None => Err(RecapError::Internal("summary task ended without a result".to_string())),
    }
}

async fn emit(events: &Option<mpsc::Sender<PipelineEvent>>, stage: PipelineStage) {
    debug!("Stage: {}", stage);
    if let Some(tx) = events {
        let _ = tx.send(PipelineEvent::Stage(stage)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemorySummaryStore;
    use crate::testing::{FakeModel, FakeSource};
    use tokio_test::{assert_err, assert_ok};

    const SUMMARY: &str = "The video explains Rust ownership in plain terms.\n\nTopics:\n00:00 - Introduction\n00:50 - Borrowing";

    fn fast_policy() -> StagePolicy {
        StagePolicy {
            fetch_timeout: Duration::from_millis(100),
            llm_timeout: Duration::from_secs(5),
            attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        source: Arc<FakeSource>,
        model: Arc<FakeModel>,
        store: Arc<MemorySummaryStore>,
    }

    fn harness(source: FakeSource, model: FakeModel) -> Harness {
        let settings = Settings::default();
        let source = Arc::new(source);
        let model = Arc::new(model);
        let store = Arc::new(MemorySummaryStore::new());
        let engine = SummarizationEngine::new(model.clone(), Prompts::default(), settings.summary.clone());

        let orchestrator = Orchestrator::with_components(
            source.clone(),
            source.clone(),
            engine,
            store.clone(),
            &settings,
        )
        .with_policy(fast_policy());

        Harness {
            orchestrator,
            source,
            model,
            store,
        }
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_first_call_computes_second_is_cached() {
        let h = harness(FakeSource::new(), FakeModel::with_text(SUMMARY));

        let first = assert_ok!(
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Short, &[])
                .await
        );
        assert!(!first.summary_text.is_empty());
        assert_eq!(first.topics.len(), 2);
        assert!(first.transcript.is_some());
        assert_eq!(h.source.transcript_calls(), 1);
        assert_eq!(h.source.metadata_calls(), 1);
        assert_eq!(h.model.calls(), 1);

        let second = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &[])
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(h.model.calls(), 1);
        assert_eq!(h.source.transcript_calls(), 1);

        let video = h.store.get_video("abc123").await.unwrap().unwrap();
        assert_eq!(video.title.as_deref(), Some("Video abc123"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_computation() {
        let h = harness(
            FakeSource::new(),
            FakeModel::with_text(SUMMARY).with_delay(Duration::from_millis(50)),
        );

        let (a, b) = tokio::join!(
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Short, &[]),
            h.orchestrator.process_video(
                "https://youtu.be/abc123",
                Language::English,
                SummaryLength::Short,
                &[]
            ),
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(h.model.calls(), 1);
        assert_eq!(h.source.transcript_calls(), 1);

        tokio::task::yield_now().await;
        assert_eq!(h.orchestrator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_with_many_callers() {
        let h = harness(
            FakeSource::new(),
            FakeModel::with_text(SUMMARY).with_delay(Duration::from_millis(30)),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = h.orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator
                        .process_video("abc123", Language::German, SummaryLength::Long, &[])
                        .await
                })
            })
            .collect();

        let mut records = Vec::new();
        for handle in handles {
            records.push(handle.await.unwrap().unwrap());
        }

        assert!(records.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(h.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_different_keys_compute_independently() {
        let h = harness(FakeSource::new(), FakeModel::with_text(SUMMARY));

        let (short, long) = tokio::join!(
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Short, &[]),
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Long, &[]),
        );

        assert_eq!(short.unwrap().length, SummaryLength::Short);
        assert_eq!(long.unwrap().length, SummaryLength::Long);
        assert_eq!(h.model.calls(), 2);
        assert_eq!(h.store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_private_video_is_unavailable_and_not_stored() {
        let h = harness(FakeSource::private(), FakeModel::with_text(SUMMARY));

        let err = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(h.model.calls(), 0);
        assert!(h.store.list().await.unwrap().is_empty());
        assert!(h.store.get_video("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_captions_are_not_found() {
        let h = harness(FakeSource::without_captions(), FakeModel::with_text(SUMMARY));

        let err = h
            .orchestrator
            .process_video("abc123", Language::French, SummaryLength::Medium, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, RecapError::NoTranscript(_)));
        assert_eq!(h.source.transcript_calls(), 1);
        assert!(h.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_timeout_is_retried() {
        let h = harness(
            FakeSource::new().with_transcript_delays([Duration::from_millis(500)]),
            FakeModel::with_text(SUMMARY),
        );

        let record = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &[])
            .await
            .unwrap();

        assert!(!record.summary_text.is_empty());
        assert_eq!(h.source.transcript_calls(), 2);
        assert_eq!(h.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_persistent_timeout_surfaces_after_retries() {
        let h = harness(
            FakeSource::new().with_transcript_delays([Duration::from_millis(500); 3]),
            FakeModel::with_text(SUMMARY),
        );

        let err = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, RecapError::Timeout(_)));
        assert!(err.is_transient());
        assert_eq!(h.source.transcript_calls(), 3);
        assert_eq!(h.model.calls(), 0);
        assert!(h.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let h = harness(
            FakeSource::new(),
            FakeModel::new(|_| Err(RecapError::LlmRefused("policy".to_string()))),
        );

        let err = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, RecapError::LlmRefused(_)));
        assert_eq!(h.model.calls(), 1);
        assert!(h.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_shared_then_retry_succeeds() {
        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = attempts.clone();
        let h = harness(
            FakeSource::new(),
            FakeModel::new(move |_| {
                if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    Err(RecapError::LlmRefused("first try".to_string()))
                } else {
                    Ok(SUMMARY.to_string())
                }
            })
            .with_delay(Duration::from_millis(30)),
        );

        let (a, b) = tokio::join!(
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Short, &[]),
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Short, &[]),
        );
        assert!(matches!(a, Err(RecapError::LlmRefused(_))));
        assert!(matches!(b, Err(RecapError::LlmRefused(_))));
        assert_eq!(h.model.calls(), 1);

        let retried = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &[])
            .await
            .unwrap();
        assert!(!retried.summary_text.is_empty());
        assert_eq!(h.model.calls(), 2);
    }

    #[tokio::test]
    async fn test_tags_attach_and_merge() {
        let h = harness(FakeSource::new(), FakeModel::with_text(SUMMARY));

        let first = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &tags(&["rust", " "]))
            .await
            .unwrap();
        assert_eq!(first.tags, normalize_tags(["rust"]));

        let second = h
            .orchestrator
            .process_video("abc123", Language::English, SummaryLength::Short, &tags(&["async"]))
            .await
            .unwrap();
        assert_eq!(second.tags, normalize_tags(["async", "rust"]));
        assert_eq!(second.summary_text, first.summary_text);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(h.model.calls(), 1);

        let key = SummaryKey::new("abc123", Language::English, SummaryLength::Short);
        assert_eq!(h.store.lookup(&key).await.unwrap().unwrap().tags, second.tags);
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_fetching() {
        let h = harness(FakeSource::new(), FakeModel::with_text(SUMMARY));

        let err = assert_err!(
            h.orchestrator
                .process_video("not a video id", Language::English, SummaryLength::Short, &[])
                .await
        );

        assert!(matches!(err, RecapError::InvalidInput(_)));
        assert_eq!(h.source.transcript_calls(), 0);
    }

    #[tokio::test]
    async fn test_events_report_stages_and_tokens() {
        let h = harness(FakeSource::new(), FakeModel::with_text(SUMMARY));
        let (tx, mut rx) = mpsc::channel(256);

        let record = h
            .orchestrator
            .process_video_with_events("abc123", Language::English, SummaryLength::Short, &[], tx)
            .await
            .unwrap();

        let mut stages = Vec::new();
        let mut text = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Stage(stage) => stages.push(stage),
                PipelineEvent::Token(token) => text.push_str(&token),
            }
        }

        assert_eq!(
            stages,
            vec![
                PipelineStage::Received,
                PipelineStage::CacheCheck,
                PipelineStage::FetchingTranscript,
                PipelineStage::FetchingMetadata,
                PipelineStage::Summarizing,
                PipelineStage::Persisting,
                PipelineStage::Done,
            ]
        );
        assert_eq!(text, SUMMARY);
        assert_eq!(record.topics.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_caller_still_fills_cache() {
        let h = harness(
            FakeSource::new(),
            FakeModel::with_text(SUMMARY).with_delay(Duration::from_millis(150)),
        );
        let (tx, mut rx) = mpsc::channel(256);

        let orchestrator = h.orchestrator.clone();
        let caller = tokio::spawn(async move {
            orchestrator
                .process_video_with_events("abc123", Language::English, SummaryLength::Short, &[], tx)
                .await
        });

        while let Some(event) = rx.recv().await {
            if matches!(event, PipelineEvent::Stage(PipelineStage::Summarizing)) {
                break;
            }
        }
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(500)).await;

        let key = SummaryKey::new("abc123", Language::English, SummaryLength::Short);
        let stored = h.store.lookup(&key).await.unwrap();
        assert!(stored.is_some());
        assert_eq!(h.model.calls(), 1);
        assert_eq!(h.orchestrator.in_flight_count(), 0);

        let again = assert_ok!(
            h.orchestrator
                .process_video("abc123", Language::English, SummaryLength::Short, &[])
                .await
        );
        assert_eq!(again.summary_text, stored.unwrap().summary_text);
        assert_eq!(h.model.calls(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = StagePolicy {
            fetch_timeout: Duration::from_secs(1),
            llm_timeout: Duration::from_secs(1),
            attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
        assert_eq!(policy.backoff(30), Duration::from_millis(1500));
    }
}
