//! Error types for Recap.

use std::sync::Arc;
use thiserror::Error;

/// Library-level error type for Recap operations.
#[derive(Error, Debug)]
pub enum RecapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No transcript available: {0}")]
    NoTranscript(String),

    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("LLM provider unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM refused to answer: {0}")]
    LlmRefused(String),

    #[error("Transcript too large for the model context: {0}")]
    ContextTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Coarse classification used to decide between retrying and surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Video or transcript absent. User-facing, never retried.
    NotFound,
    /// Private, removed, age-restricted or region-locked video.
    Unavailable,
    /// Upstream throttling or timeout. Eligible for bounded retry.
    Transient,
    /// The request cannot succeed as submitted (bad input, refusal, context size).
    Fatal,
    /// Local failure: configuration, tools, storage.
    Internal,
}

impl RecapError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecapError::NoTranscript(_) | RecapError::NotFound(_) => ErrorKind::NotFound,
            RecapError::VideoUnavailable(_) => ErrorKind::Unavailable,
            RecapError::RateLimited(_) | RecapError::Timeout(_) => ErrorKind::Transient,
            RecapError::Http(e) if e.is_timeout() => ErrorKind::Transient,
            RecapError::InvalidInput(_)
            | RecapError::LlmUnavailable(_)
            | RecapError::LlmRefused(_)
            | RecapError::ContextTooLarge(_) => ErrorKind::Fatal,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether an automatic retry may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Produce an equivalent error for another waiter on the same computation.
    ///
    /// Domain variants are cloned as-is; wrapped foreign errors are carried
    /// over by message since they cannot be cloned.
    pub fn replicate(&self) -> RecapError {
        match self {
            RecapError::Config(m) => RecapError::Config(m.clone()),
            RecapError::InvalidInput(m) => RecapError::InvalidInput(m.clone()),
            RecapError::NoTranscript(m) => RecapError::NoTranscript(m.clone()),
            RecapError::VideoUnavailable(m) => RecapError::VideoUnavailable(m.clone()),
            RecapError::RateLimited(m) => RecapError::RateLimited(m.clone()),
            RecapError::Timeout(m) => RecapError::Timeout(m.clone()),
            RecapError::LlmUnavailable(m) => RecapError::LlmUnavailable(m.clone()),
            RecapError::LlmRefused(m) => RecapError::LlmRefused(m.clone()),
            RecapError::ContextTooLarge(m) => RecapError::ContextTooLarge(m.clone()),
            RecapError::NotFound(m) => RecapError::NotFound(m.clone()),
            RecapError::Store(m) => RecapError::Store(m.clone()),
            RecapError::ToolNotFound(m) => RecapError::ToolNotFound(m.clone()),
            RecapError::ToolFailed(m) => RecapError::ToolFailed(m.clone()),
            RecapError::Internal(m) => RecapError::Internal(m.clone()),
            RecapError::Io(e) => RecapError::Io(std::io::Error::new(e.kind(), e.to_string())),
            RecapError::Http(e) if e.is_timeout() => RecapError::Timeout(e.to_string()),
            RecapError::Json(_) | RecapError::TomlParse(_) | RecapError::Http(_) => {
                RecapError::Internal(self.to_string())
            }
            RecapError::Database(_) => RecapError::Store(self.to_string()),
        }
    }
}

impl From<Arc<RecapError>> for RecapError {
    fn from(shared: Arc<RecapError>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.replicate())
    }
}

/// Result type alias for Recap operations.
pub type Result<T> = std::result::Result<T, RecapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RecapError::NoTranscript("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(RecapError::VideoUnavailable("x".into()).kind(), ErrorKind::Unavailable);
        assert_eq!(RecapError::Timeout("x".into()).kind(), ErrorKind::Transient);
        assert_eq!(RecapError::LlmRefused("x".into()).kind(), ErrorKind::Fatal);
        assert_eq!(RecapError::Store("x".into()).kind(), ErrorKind::Internal);

        assert!(RecapError::RateLimited("slow down".into()).is_transient());
        assert!(!RecapError::ContextTooLarge("huge".into()).is_transient());
    }

    #[test]
    fn test_shared_error_unwraps_or_replicates() {
        let shared = Arc::new(RecapError::VideoUnavailable("private".into()));
        let other = shared.clone();

        let first: RecapError = shared.into();
        assert!(matches!(first, RecapError::VideoUnavailable(ref m) if m == "private"));

        let io = Arc::new(RecapError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        )));
        let _keep = io.clone();
        let replicated: RecapError = io.into();
        assert!(matches!(replicated, RecapError::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));

        let last: RecapError = other.into();
        assert_eq!(last.kind(), ErrorKind::Unavailable);
    }
}
