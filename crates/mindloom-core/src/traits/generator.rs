//! Card generator trait.

use async_trait::async_trait;

use crate::error::MindloomResult;
use crate::types::CardKind;

/// A structured card produced from plain text.
#[derive(Debug, Clone)]
pub struct GeneratedCard {
    pub kind: CardKind,
    /// Full card JSON, including the `_metadata` envelope on success.
    pub card: serde_json::Value,
    /// True when generation fell back to a minimal plain-text card.
    pub fallback: bool,
}

/// Plain text to structured card conversion.
///
/// Used at bootstrap time (first self card) and when the updater creates a
/// card for a newly mentioned person.
#[async_trait]
pub trait CardGenerator: Send + Sync {
    async fn generate(
        &self,
        kind: CardKind,
        plain_text: &str,
        context: Option<&str>,
        name: Option<&str>,
    ) -> MindloomResult<GeneratedCard>;
}
