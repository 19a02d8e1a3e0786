//! Memory card types.
//!
//! A card is a persisted structured fact about the user (self card), a person
//! in their life (character card), or a life event (world event). Self and
//! character cards carry a free-form JSON payload shaped as
//! `{"data": {...}, "_metadata": {...}}`; world events are fully typed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved payload key holding per-field provenance metadata.
pub const METADATA_KEY: &str = "_metadata";

/// Card kind discriminant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CardKind {
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    SelfCard,
    #[serde(rename = "character")]
    Character,
    #[serde(rename = "world")]
    #[strum(serialize = "world")]
    World,
}

/// Broad relationship category for character cards.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RelationshipCategory {
    Family,
    Friend,
    Coworker,
    Romantic,
    Other,
}

/// The user's own card. Exactly one per owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCard {
    pub id: i64,
    pub owner_id: i64,
    /// `{"data": {...}, "_metadata": {...}}` envelope.
    pub payload: serde_json::Value,
    pub auto_update_enabled: bool,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A card describing a person in the user's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterCard {
    pub id: i64,
    pub owner_id: i64,
    pub display_name: String,
    pub relationship_category: RelationshipCategory,
    /// Free-text override for precise matching (e.g. "Sister"). Matched
    /// ahead of the broad category keyword list.
    pub relationship_label: Option<String>,
    /// `{"data": {...}, "_metadata": {...}}` envelope.
    pub payload: serde_json::Value,
    pub auto_update_enabled: bool,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A life event card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEventCard {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    /// Free-text category, e.g. "achievement", "trauma".
    pub event_type: String,
    pub resolved: bool,
    pub auto_update_enabled: bool,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Tagged union over the three card kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "card_type", rename_all = "lowercase")]
pub enum MemoryCard {
    #[serde(rename = "self")]
    SelfCard(SelfCard),
    Character(CharacterCard),
    World(WorldEventCard),
}

impl MemoryCard {
    pub fn kind(&self) -> CardKind {
        match self {
            MemoryCard::SelfCard(_) => CardKind::SelfCard,
            MemoryCard::Character(_) => CardKind::Character,
            MemoryCard::World(_) => CardKind::World,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            MemoryCard::SelfCard(c) => c.id,
            MemoryCard::Character(c) => c.id,
            MemoryCard::World(c) => c.id,
        }
    }

    pub fn owner_id(&self) -> i64 {
        match self {
            MemoryCard::SelfCard(c) => c.owner_id,
            MemoryCard::Character(c) => c.owner_id,
            MemoryCard::World(c) => c.owner_id,
        }
    }

    pub fn is_pinned(&self) -> bool {
        match self {
            MemoryCard::SelfCard(c) => c.is_pinned,
            MemoryCard::Character(c) => c.is_pinned,
            MemoryCard::World(c) => c.is_pinned,
        }
    }

    pub fn auto_update_enabled(&self) -> bool {
        match self {
            MemoryCard::SelfCard(c) => c.auto_update_enabled,
            MemoryCard::Character(c) => c.auto_update_enabled,
            MemoryCard::World(c) => c.auto_update_enabled,
        }
    }

    /// A payload view for context rendering. Self and character cards carry
    /// their stored envelope; world events synthesize one from typed fields.
    pub fn context_payload(&self) -> serde_json::Value {
        match self {
            MemoryCard::SelfCard(c) => c.payload.clone(),
            MemoryCard::Character(c) => {
                let mut payload = c.payload.clone();
                if let Some(obj) = payload.get_mut("data").and_then(|d| d.as_object_mut()) {
                    obj.insert(
                        "name".to_string(),
                        serde_json::Value::String(c.display_name.clone()),
                    );
                    if let Some(label) = &c.relationship_label {
                        obj.insert(
                            "relationship_label".to_string(),
                            serde_json::Value::String(label.clone()),
                        );
                    }
                }
                payload
            }
            MemoryCard::World(c) => serde_json::json!({
                "data": {
                    "title": c.title,
                    "description": c.description,
                    "key_array": c.keywords,
                    "event_type": c.event_type,
                    "resolved": c.resolved,
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_kind_display() {
        assert_eq!(CardKind::SelfCard.to_string(), "self");
        assert_eq!(CardKind::Character.to_string(), "character");
        assert_eq!(CardKind::World.to_string(), "world");
    }

    #[test]
    fn test_relationship_category_parse() {
        use std::str::FromStr;
        assert_eq!(
            RelationshipCategory::from_str("family").unwrap(),
            RelationshipCategory::Family
        );
        assert_eq!(
            RelationshipCategory::from_str("Romantic").unwrap(),
            RelationshipCategory::Romantic
        );
        assert!(RelationshipCategory::from_str("stranger").is_err());
    }

    #[test]
    fn test_memory_card_tagged_serialization() {
        let card = MemoryCard::World(WorldEventCard {
            id: 7,
            owner_id: 1,
            title: "Going to college".to_string(),
            description: "Started college in 2020".to_string(),
            keywords: vec!["college".to_string(), "education".to_string()],
            event_type: "transition".to_string(),
            resolved: false,
            auto_update_enabled: true,
            is_pinned: false,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        });

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["card_type"], "world");
        assert_eq!(json["title"], "Going to college");
    }

    #[test]
    fn test_world_context_payload() {
        let card = MemoryCard::World(WorldEventCard {
            id: 7,
            owner_id: 1,
            title: "Promotion".to_string(),
            description: "Got promoted".to_string(),
            keywords: vec!["promotion".to_string()],
            event_type: "achievement".to_string(),
            resolved: true,
            auto_update_enabled: true,
            is_pinned: false,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        });

        let payload = card.context_payload();
        assert_eq!(payload["data"]["title"], "Promotion");
        assert_eq!(payload["data"]["event_type"], "achievement");
    }
}
