//! OpenRouter LLM provider implementation.
//!
//! OpenRouter speaks the OpenAI chat-completions wire format. The provider
//! carries a bounded request timeout and a one-shot fallback model: when the
//! primary model fails, the same request is retried once against the
//! configured fallback before the error surfaces.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use mindloom_core::error::{MindloomError, MindloomResult};
use mindloom_core::traits::{
    GenerationOptions, Llm, LlmConfig, LlmResponse, LlmStream, TokenUsage,
};
use mindloom_core::types::{Message, MessageRole};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter LLM provider.
pub struct OpenRouterLlm {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenRouterLlm {
    /// Create a new OpenRouter LLM provider.
    pub fn new(config: LlmConfig) -> MindloomResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .ok_or_else(|| {
                MindloomError::Configuration(
                    "OpenRouter API key not found. Set OPENROUTER_API_KEY environment variable or provide api_key in config.".to_string(),
                )
            })?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse()
                .map_err(|_| MindloomError::Configuration("Invalid API key format".to_string()))?,
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json"
                .parse()
                .map_err(|_| MindloomError::Configuration("Invalid content type".to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                MindloomError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url = match config.base_url.clone() {
            Some(base_url) => {
                Url::parse(&base_url).map_err(|e| {
                    MindloomError::Configuration(format!("Invalid base URL '{}': {}", base_url, e))
                })?;
                base_url
            }
            None => OPENROUTER_API_URL.to_string(),
        };

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> MindloomResult<LlmResponse> {
        let chat_messages: Vec<ChatMessage> = messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    MessageRole::System => "system".to_string(),
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let request = ChatRequest {
            model: model.to_string(),
            messages: chat_messages,
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            max_tokens: Some(options.max_tokens.unwrap_or(self.config.max_tokens)),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MindloomError::network(format!("OpenRouter request timed out: {}", e))
                } else {
                    MindloomError::llm(format!("OpenRouter request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MindloomError::llm(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(MindloomError::llm(format!(
                "OpenRouter API error ({}): {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| MindloomError::llm(format!("Unexpected OpenRouter response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MindloomError::llm("No response choices returned"))?;

        Ok(LlmResponse {
            content: choice.message.content,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[async_trait]
impl Llm for OpenRouterLlm {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> MindloomResult<LlmResponse> {
        let options = options.unwrap_or_default();

        match self
            .chat_completion(&self.config.model, messages, &options)
            .await
        {
            Ok(response) => Ok(response),
            Err(primary_err) => {
                let Some(fallback) = self
                    .config
                    .fallback_model
                    .as_deref()
                    .filter(|f| *f != self.config.model)
                else {
                    return Err(primary_err);
                };

                tracing::warn!(
                    "Primary model '{}' failed ({}), trying fallback '{}'",
                    self.config.model,
                    primary_err,
                    fallback
                );
                self.chat_completion(fallback, messages, &options).await
            }
        }
    }

    async fn generate_stream(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> MindloomResult<LlmStream> {
        // Nothing in the core streams; chat streaming lives in the HTTP layer.
        Err(MindloomError::llm(
            "Streaming not yet implemented for OpenRouter",
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-or-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = LlmConfig {
            api_key: None,
            ..Default::default()
        };
        // Only valid when the environment variable is also absent.
        if std::env::var("OPENROUTER_API_KEY").is_err() {
            assert!(OpenRouterLlm::new(config).is_err());
        }
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let config = LlmConfig {
            base_url: Some("not a url".to_string()),
            ..config_with_key()
        };
        assert!(OpenRouterLlm::new(config).is_err());
    }

    #[test]
    fn test_model_name_from_config() {
        let provider = OpenRouterLlm::new(config_with_key()).unwrap();
        assert_eq!(provider.model_name(), "anthropic/claude-3-haiku");
    }
}
