//! Factory for creating LLM providers.

use std::sync::Arc;

use mindloom_core::error::MindloomResult;
use mindloom_core::traits::{Llm, LlmConfig};

use crate::openrouter::OpenRouterLlm;

/// Factory for LLM provider construction.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an OpenRouter provider with default configuration
    /// (API key from `OPENROUTER_API_KEY`).
    pub fn openrouter() -> MindloomResult<Arc<dyn Llm>> {
        Self::openrouter_with_config(LlmConfig::default())
    }

    /// Create an OpenRouter provider for a specific model.
    pub fn openrouter_with_model(model: impl Into<String>) -> MindloomResult<Arc<dyn Llm>> {
        Self::openrouter_with_config(LlmConfig {
            model: model.into(),
            ..Default::default()
        })
    }

    /// Create an OpenRouter provider from a full configuration.
    pub fn openrouter_with_config(config: LlmConfig) -> MindloomResult<Arc<dyn Llm>> {
        Ok(Arc::new(OpenRouterLlm::new(config)?))
    }
}
