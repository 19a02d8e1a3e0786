//! mindloom-llm - LLM provider implementations for mindloom.
//!
//! # Supported Providers
//!
//! - **OpenRouter** - OpenAI-compatible gateway with per-request model
//!   selection and a configured fallback model.
//!
//! # Example
//!
//! ```ignore
//! use mindloom_llm::LlmFactory;
//!
//! let llm = LlmFactory::openrouter()?;
//! let llm = LlmFactory::openrouter_with_model("anthropic/claude-3-haiku")?;
//! ```

mod factory;
mod openrouter;

pub use factory::LlmFactory;
pub use openrouter::OpenRouterLlm;

// Re-export core types for convenience
pub use mindloom_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse};
