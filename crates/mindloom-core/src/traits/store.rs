//! Persistent store trait for cards, mentions, and transcripts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MindloomResult;
use crate::types::{
    CardKind, CharacterCard, ChatMessage, EntityMention, MemoryCard, OperationMetric,
    RelationshipCategory, SelfCard, SessionRecord, WorldEventCard,
};

/// Who performed a card write. Every write is audited with this.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChangedBy {
    User,
    System,
}

/// Persistent store for memory cards, entity mentions, and chat transcripts.
///
/// Sessions and messages are read-only from the core's perspective. Card
/// writes append an audit row recording `changed_by`; user edits additionally
/// reset field metadata (caller's responsibility via the metadata tracker).
#[async_trait]
pub trait CardStore: Send + Sync {
    // Self cards. Exactly one per owner.
    async fn get_self_card(&self, owner_id: i64) -> MindloomResult<Option<SelfCard>>;
    async fn get_self_card_by_id(&self, card_id: i64) -> MindloomResult<Option<SelfCard>>;
    async fn create_self_card(
        &self,
        owner_id: i64,
        payload: serde_json::Value,
        auto_update_enabled: bool,
    ) -> MindloomResult<SelfCard>;
    async fn update_self_card(
        &self,
        card_id: i64,
        payload: serde_json::Value,
        changed_by: ChangedBy,
    ) -> MindloomResult<()>;

    // Character cards.
    async fn get_character_cards(&self, owner_id: i64) -> MindloomResult<Vec<CharacterCard>>;
    async fn create_character_card(
        &self,
        owner_id: i64,
        display_name: &str,
        relationship_category: RelationshipCategory,
        relationship_label: Option<&str>,
        payload: serde_json::Value,
    ) -> MindloomResult<CharacterCard>;
    async fn update_character_card(
        &self,
        card_id: i64,
        payload: serde_json::Value,
        changed_by: ChangedBy,
    ) -> MindloomResult<()>;

    // World events.
    async fn get_world_events(&self, owner_id: i64) -> MindloomResult<Vec<WorldEventCard>>;
    async fn create_world_event(&self, event: WorldEventCard) -> MindloomResult<WorldEventCard>;
    async fn update_world_event(
        &self,
        card_id: i64,
        description: Option<&str>,
        keywords: Option<&[String]>,
        changed_by: ChangedBy,
    ) -> MindloomResult<()>;

    /// All pinned cards for an owner, regardless of kind.
    async fn get_pinned_cards(&self, owner_id: i64) -> MindloomResult<Vec<MemoryCard>>;

    // Entity mentions. Append-only.
    async fn add_mention(
        &self,
        owner_id: i64,
        session_id: i64,
        kind: CardKind,
        card_ref: &str,
        context_snippet: &str,
        mentioned_at: DateTime<Utc>,
    ) -> MindloomResult<i64>;
    /// Most recent mentions first.
    async fn get_mentions(&self, owner_id: i64, limit: usize)
        -> MindloomResult<Vec<EntityMention>>;

    // Sessions and messages (read-only).
    async fn get_session(&self, session_id: i64) -> MindloomResult<Option<SessionRecord>>;
    async fn get_session_messages(&self, session_id: i64) -> MindloomResult<Vec<ChatMessage>>;

    // Edit audit.
    async fn last_edit_by(
        &self,
        kind: CardKind,
        card_id: i64,
        changed_by: ChangedBy,
    ) -> MindloomResult<Option<DateTime<Utc>>>;

    // Telemetry.
    async fn record_metric(&self, metric: &OperationMetric) -> MindloomResult<()>;
}
