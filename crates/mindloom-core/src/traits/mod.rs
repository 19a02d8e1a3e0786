//! Trait seams for external collaborators.

mod generator;
mod llm;
mod store;

pub use generator::{CardGenerator, GeneratedCard};
pub use llm::{GenerationOptions, Llm, LlmConfig, LlmResponse, LlmStream, StreamItem, TokenUsage};
pub use store::{CardStore, ChangedBy};
