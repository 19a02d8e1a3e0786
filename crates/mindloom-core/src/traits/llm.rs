//! The language-model seam.
//!
//! The core treats the model as an opaque completion capability: hand it a
//! conversation, get free-form text back. Responses may wrap JSON in
//! markdown fences or include trailing commas; callers run them through
//! [`crate::json_repair`] before parsing. Which provider serves the calls is
//! a `mindloom-llm` concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::MindloomResult;
use crate::types::Message;

/// One completed generation.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// The generated text, or `""` when the model returned nothing.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Per-call sampling overrides. Unset fields fall back to the provider's
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// One incremental chunk of a streamed response.
pub type StreamItem = Result<String, crate::error::MindloomError>;

/// Stream of incremental response chunks.
pub type LlmStream = Pin<Box<dyn futures::Stream<Item = StreamItem> + Send>>;

/// Completion capability every provider implements.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> MindloomResult<LlmResponse>;

    async fn generate_stream(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> MindloomResult<LlmStream>;

    /// Identifier of the model answering the calls, for telemetry.
    fn model_name(&self) -> &str;
}

/// Provider configuration: model selection, sampling defaults, and the
/// request timeout that bounds every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    /// Tried once when the primary model fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Overrides the `OPENROUTER_API_KEY` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-3-haiku".to_string(),
            fallback_model: Some("openai/gpt-3.5-turbo".to_string()),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 30,
            api_key: None,
            base_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_constructor() {
        let options = GenerationOptions::new(0.2, 500);
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(500));
        assert_eq!(GenerationOptions::default().temperature, None);
    }

    #[test]
    fn test_response_content_or_empty() {
        assert_eq!(LlmResponse::default().content_or_empty(), "");
    }

    #[test]
    fn test_llm_config_defaults_carry_a_timeout() {
        let config = LlmConfig::default();
        assert!(config.timeout_secs > 0);
        assert!(config.fallback_model.is_some());
    }
}
