//! mindloom-core - structured memory core for a therapeutic storytelling
//! companion.
//!
//! This crate provides the card types, entity detection, context assembly,
//! and confidence-gated auto-update pipeline that keep an LLM counselor's
//! memory of the user current.
//!
//! # Example
//!
//! ```ignore
//! use mindloom_core::{CoreConfig, MemoryEngine, SqliteStore};
//!
//! let config = CoreConfig::from_env()?;
//! let store = Arc::new(SqliteStore::new(&config.database_path)?);
//! let engine = MemoryEngine::new(config, store, llm, generator);
//!
//! // During a chat turn:
//! let mentions = engine.detect_mentions("my mom called today", owner_id).await;
//! let context = engine.assemble_context(owner_id, session_id).await;
//!
//! // After the session ends:
//! let outcome = engine.analyze_and_update(owner_id, session_id, &messages).await?;
//! ```

pub mod config;
pub mod context;
pub mod detect;
pub mod engine;
pub mod error;
pub mod friendship;
pub mod generate;
pub mod insight;
pub mod json_repair;
pub mod metadata;
pub mod retry;
pub mod store;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod update;

// Re-export commonly used types
pub use config::{CoreConfig, Environment};
pub use context::{ContextAssembler, ContextBundle};
pub use detect::{EntityDetector, Lexicon};
pub use engine::MemoryEngine;
pub use error::{ErrorCode, MindloomError, MindloomResult};
pub use friendship::{friendship_prompt, FriendshipAnalyzer, FriendshipDelta};
pub use generate::LlmCardGenerator;
pub use insight::{InsightExtractor, SessionInsights};
pub use retry::RetryPolicy;
pub use store::SqliteStore;
pub use traits::{CardGenerator, CardStore, ChangedBy, GeneratedCard, Llm, LlmConfig};
pub use types::{
    CardKind, CharacterCard, ChatMessage, DetectedMention, EntityMention, MatchKind, MemoryCard,
    Message, MessageRole, RelationshipCategory, SelfCard, SessionRecord, Speaker, WorldEventCard,
};
pub use update::{CardUpdater, UpdateOutcome};
