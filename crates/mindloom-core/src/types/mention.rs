//! Entity mention types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::CardKind;

/// Why a card matched during entity detection, ordered by match priority.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchKind {
    /// Exact display-name match (character cards).
    Name,
    /// Exact title match (world events).
    Title,
    /// Custom relationship label match (character cards).
    Label,
    /// Category keyword or event keyword-array match.
    Keyword,
    /// Event-type match; matches every event sharing the type.
    EventType,
}

/// A card detected in a message, before any mention is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedMention {
    pub card_id: i64,
    pub kind: CardKind,
    pub match_kind: MatchKind,
}

/// A persisted observation that a card was referenced in a session.
/// Append-only; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMention {
    pub id: i64,
    pub owner_id: i64,
    pub session_id: i64,
    pub kind: CardKind,
    /// Card id as a string, matching the stored wire shape.
    pub card_ref: String,
    /// The triggering message text.
    pub context_snippet: String,
    pub mentioned_at: DateTime<Utc>,
}

impl EntityMention {
    /// Parse the card reference back to a card id.
    pub fn card_id(&self) -> Option<i64> {
        self.card_ref.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_kind_display() {
        assert_eq!(MatchKind::Name.to_string(), "name");
        assert_eq!(MatchKind::EventType.to_string(), "event_type");
    }

    #[test]
    fn test_mention_card_id_parse() {
        let mention = EntityMention {
            id: 1,
            owner_id: 1,
            session_id: 1,
            kind: CardKind::Character,
            card_ref: "42".to_string(),
            context_snippet: "my mom called".to_string(),
            mentioned_at: Utc::now(),
        };
        assert_eq!(mention.card_id(), Some(42));

        let bad = EntityMention {
            card_ref: "not-a-number".to_string(),
            ..mention
        };
        assert_eq!(bad.card_id(), None);
    }
}
