//! Core types for mindloom.

mod card;
mod mention;
mod message;
mod metric;

pub use card::{
    CardKind, CharacterCard, MemoryCard, RelationshipCategory, SelfCard, WorldEventCard,
    METADATA_KEY,
};
pub use mention::{DetectedMention, EntityMention, MatchKind};
pub use message::{format_messages, ChatMessage, Message, MessageRole, SessionRecord, Speaker};
pub use metric::{OperationMetric, OperationStatus};
