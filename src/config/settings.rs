//! Configuration settings for Recap.

use crate::source::Language;
use crate::summary::SummaryLength;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub youtube: YoutubeSettings,
    pub summary: SummarySettings,
    pub store: StoreSettings,
    pub pipeline: PipelineSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.recap".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// LLM provider type.
///
/// All providers speak the OpenAI chat completions protocol; the choice only
/// changes endpoint and credentials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// api.openai.com (default).
    #[default]
    OpenAI,
    /// openrouter.ai hosted gateway.
    OpenRouter,
    /// Azure OpenAI enterprise deployment.
    Azure,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "azure" | "azure_openai" => Ok(LlmProvider::Azure),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::OpenRouter => write!(f, "openrouter"),
            LlmProvider::Azure => write!(f, "azure"),
        }
    }
}

impl LlmProvider {
    /// Environment variable read for the API key when none is configured.
    pub fn default_key_env(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Azure => "AZURE_OPENAI_KEY",
        }
    }
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider (openai, openrouter, azure).
    pub provider: LlmProvider,
    /// Model name (deployment name for Azure).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Override for the API base URL (Azure endpoint for azure).
    pub api_base: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Azure deployment name (defaults to `model`).
    pub azure_deployment: Option<String>,
    /// Azure API version.
    pub azure_api_version: String,
    /// HTTP timeout for a single completion request.
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            api_base: None,
            api_key_env: None,
            azure_deployment: None,
            azure_api_version: "2024-02-15-preview".to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl LlmSettings {
    /// Environment variable holding the API key.
    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_key_env())
    }

    /// Whether an API key is present in the environment.
    pub fn has_api_key(&self) -> bool {
        std::env::var(self.key_env()).is_ok_and(|k| !k.trim().is_empty())
    }
}

/// YouTube-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// Path or name of the yt-dlp executable.
    pub ytdlp_path: String,
    /// Languages summaries may be requested in.
    pub languages: Vec<Language>,
    /// Accept YouTube machine translations into the requested language.
    pub allow_translated: bool,
    /// HTTP timeout for caption downloads.
    pub http_timeout_secs: u64,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            languages: Language::ALL.to_vec(),
            allow_translated: true,
            http_timeout_secs: 30,
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// Language used when none is requested.
    pub default_language: Language,
    /// Length class used when none is requested.
    pub default_length: SummaryLength,
    /// Prompt size budget in characters; larger transcripts are chunked.
    pub max_prompt_chars: usize,
    /// Upper bound on transcript chunks before giving up with ContextTooLarge.
    pub max_chunks: usize,
    /// Chunk summaries requested concurrently.
    pub chunk_concurrency: usize,
    /// Seconds of captions grouped under one timestamp in prompts.
    pub paragraph_seconds: f64,
    /// Keep the raw transcript alongside the summary.
    pub store_transcript: bool,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            default_language: Language::English,
            default_length: SummaryLength::Medium,
            max_prompt_chars: 48_000,
            max_chunks: 24,
            chunk_concurrency: 3,
            paragraph_seconds: 30.0,
            store_transcript: true,
        }
    }
}

/// Summary store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.recap/summaries.db".to_string(),
        }
    }
}

/// Timeouts and retry policy for pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Timeout for each transcript or metadata fetch attempt.
    pub fetch_timeout_secs: u64,
    /// Timeout for each summarization attempt.
    pub llm_timeout_secs: u64,
    /// Attempts per stage for transient failures (1 = no retry).
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_base_delay_ms: u64,
    /// Upper bound on the retry delay.
    pub retry_max_delay_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 60,
            llm_timeout_secs: 300,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
        }
    }
}

impl PipelineSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RecapError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recap")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}
