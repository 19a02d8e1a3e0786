//! Wire types for the batch update proposal returned by the LLM.

use serde::Deserialize;
use serde_json::Value;

use crate::json_repair::parse_lenient;
use crate::types::CardKind;

use super::merge::UpdateAction;

/// One field-level diff proposed for a card.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub action: UpdateAction,
    pub value: Value,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Proposed updates for one existing card.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordProposal {
    #[serde(alias = "record_id")]
    pub card_id: i64,
    #[serde(alias = "record_type")]
    pub card_type: CardKind,
    #[serde(default)]
    pub updates: Vec<FieldDiff>,
}

/// A new card the LLM wants created.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCardProposal {
    #[serde(default, alias = "record_type")]
    pub card_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "relationship_category")]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<Value>,
}

/// The full batch proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchProposal {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub updates: Vec<RecordProposal>,
    #[serde(default)]
    pub new_cards: Vec<NewCardProposal>,
}

/// Parse a batch proposal out of a raw LLM response. Returns `None` when the
/// response cannot be repaired into valid JSON.
pub fn parse_batch_proposal(response: &str) -> Option<BatchProposal> {
    parse_lenient(response)
}
