//! Language model capability.
//!
//! The pipeline only needs "submit a prompt, get text back (optionally as a
//! stream of increments)". Provider choice is configuration.

mod openai;

pub use openai::OpenAiModel;

use crate::config::{LlmProvider, LlmSettings};
use crate::error::{RecapError, Result};
use async_openai::config::{AzureConfig, OpenAIConfig};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// A chat prompt: system instructions plus one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Total characters sent to the model.
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Stream of text increments from a model.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Trait for text completion providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt and return the full text.
    ///
    /// Fails with `LlmUnavailable` (transport/auth), `LlmRefused` (content
    /// policy or empty output), `ContextTooLarge`, `RateLimited` or `Timeout`.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Complete a prompt, yielding text increments as they arrive.
    async fn complete_stream(&self, prompt: &Prompt) -> Result<TextStream>;

    /// Model identifier for logs.
    fn model_name(&self) -> &str;
}

/// Build the configured language model.
pub fn create_model(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    let key_env = settings.key_env();
    let api_key = std::env::var(key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| RecapError::Config(format!("{} is not set", key_env)))?;
    let timeout = Duration::from_secs(settings.request_timeout_secs);

    let model: Arc<dyn LanguageModel> = match settings.provider {
        LlmProvider::OpenAI => {
            let mut config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(base) = &settings.api_base {
                config = config.with_api_base(base);
            }
            Arc::new(OpenAiModel::new(config, settings, timeout)?)
        }
        LlmProvider::OpenRouter => {
            let base = settings.api_base.as_deref().unwrap_or(OPENROUTER_API_BASE);
            let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(base);
            Arc::new(OpenAiModel::new(config, settings, timeout)?)
        }
        LlmProvider::Azure => {
            let endpoint = settings
                .api_base
                .clone()
                .or_else(|| std::env::var("AZURE_OPENAI_ENDPOINT").ok())
                .ok_or_else(|| {
                    RecapError::Config(
                        "Azure requires llm.api_base or AZURE_OPENAI_ENDPOINT".to_string(),
                    )
                })?;
            let deployment = settings
                .azure_deployment
                .clone()
                .or_else(|| std::env::var("AZURE_OPENAI_DEPLOYMENT").ok())
                .unwrap_or_else(|| settings.model.clone());
            let config = AzureConfig::new()
                .with_api_base(endpoint)
                .with_api_key(api_key)
                .with_deployment_id(deployment)
                .with_api_version(settings.azure_api_version.clone());
            Arc::new(OpenAiModel::new(config, settings, timeout)?)
        }
    };

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_length() {
        let prompt = Prompt::new("sys", "héllo");
        assert_eq!(prompt.char_len(), 8);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let settings = LlmSettings {
            api_key_env: Some("RECAP_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..LlmSettings::default()
        };

        let err = create_model(&settings).err().unwrap();
        assert!(matches!(err, RecapError::Config(ref m) if m.contains("RECAP_TEST_KEY_THAT_IS_NEVER_SET")));
    }
}
