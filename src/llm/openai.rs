//! OpenAI-compatible chat completion client.
//!
//! Serves api.openai.com, OpenRouter and Azure OpenAI through the matching
//! `async_openai` config.

use super::{LanguageModel, Prompt, TextStream};
use crate::config::LlmSettings;
use crate::error::{RecapError, Result};
use async_openai::config::Config;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat model reached through an OpenAI-compatible endpoint.
pub struct OpenAiModel<C: Config> {
    client: Client<C>,
    model: String,
    temperature: f32,
}

impl<C: Config> OpenAiModel<C> {
    /// Create a model client with a request timeout.
    pub fn new(config: C, settings: &LlmSettings, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecapError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn build_request(&self, prompt: &Prompt, stream: bool) -> Result<CreateChatCompletionRequest> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.clone())
                .build()
                .map_err(|e| RecapError::Internal(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.clone())
                .build()
                .map_err(|e| RecapError::Internal(e.to_string()))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .stream(stream)
            .build()
            .map_err(|e| RecapError::Internal(e.to_string()))
    }
}

#[async_trait]
impl<C: Config + Send + Sync + 'static> LanguageModel for OpenAiModel<C> {
    #[instrument(skip(self, prompt), fields(model = %self.model, chars = prompt.char_len()))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = self.build_request(prompt, false)?;
        let response = self.client.chat().create(request).await.map_err(map_openai_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RecapError::LlmRefused("response has no choices".to_string()))?;

        if matches!(choice.finish_reason, Some(FinishReason::ContentFilter)) {
            return Err(RecapError::LlmRefused("blocked by content filter".to_string()));
        }

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(RecapError::LlmRefused("empty completion".to_string()));
        }

        debug!("Completion of {} chars", text.len());
        Ok(text)
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, chars = prompt.char_len()))]
    async fn complete_stream(&self, prompt: &Prompt) -> Result<TextStream> {
        let request = self.build_request(prompt, true)?;
        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_openai_error)?;

        let text = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => {
                    let choice = response.choices.into_iter().next()?;
                    if matches!(choice.finish_reason, Some(FinishReason::ContentFilter)) {
                        return Some(Err(RecapError::LlmRefused(
                            "blocked by content filter".to_string(),
                        )));
                    }
                    choice.delta.content.filter(|t| !t.is_empty()).map(Ok)
                }
                Err(e) => Some(Err(map_openai_error(e))),
            }
        });

        Ok(Box::pin(text))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map provider errors onto the error taxonomy.
fn map_openai_error(err: OpenAIError) -> RecapError {
    match err {
        OpenAIError::Reqwest(e) if e.is_timeout() => RecapError::Timeout(e.to_string()),
        OpenAIError::Reqwest(e) => RecapError::LlmUnavailable(e.to_string()),
        OpenAIError::ApiError(api) => {
            let detail = format!("{:?} {:?} {}", api.code, api.r#type, api.message).to_lowercase();
            classify_api_error(&detail, api.message)
        }
        other => RecapError::LlmUnavailable(other.to_string()),
    }
}

fn classify_api_error(detail: &str, message: String) -> RecapError {
    if detail.contains("context_length") || detail.contains("maximum context") {
        RecapError::ContextTooLarge(message)
    } else if detail.contains("rate_limit") || detail.contains("rate limit") {
        RecapError::RateLimited(message)
    } else if detail.contains("content_filter")
        || detail.contains("content_policy")
        || detail.contains("content management policy")
    {
        RecapError::LlmRefused(message)
    } else {
        RecapError::LlmUnavailable(message)
    }
}
