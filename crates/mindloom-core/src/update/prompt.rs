//! Prompt construction for the batch update proposal.

use crate::types::{format_messages, ChatMessage, CharacterCard, SelfCard, WorldEventCard};

/// Build the single update-proposal prompt from the transcript and a summary
/// of all existing cards (the summary is what lets the model dedup against
/// cards it already knows about).
pub fn build_update_prompt(
    messages: &[ChatMessage],
    self_card: Option<&SelfCard>,
    characters: &[CharacterCard],
    events: &[WorldEventCard],
) -> String {
    let transcript = format_messages(messages);
    let summary = existing_cards_summary(self_card, characters, events);

    format!(
        r#"You are a card updater for a therapeutic storytelling app, analyzing a counseling session transcript.

TRANSCRIPT:
---
{transcript}

EXISTING CARDS:
---
{summary}

Output ONLY valid JSON proposing updates:
{{
  "confidence": 0.0-1.0,
  "updates": [
    {{
      "card_id": 12,
      "card_type": "character|self|world",
      "updates": [
        {{
          "field": "personality|patterns|key_events|user_feelings|key_array|description|traits|interests|values",
          "action": "merge|append|replace",
          "value": "...",
          "reason": "...",
          "confidence": 0.0-1.0
        }}
      ]
    }}
  ],
  "new_cards": [
    {{"card_type": "character", "name": "...", "relationship_type": "family|friend|coworker|romantic|other"}}
  ]
}}

Rules:
- Only propose updates if you're confident (confidence >= 0.7 per field)
- For personality: use "merge" action
- For patterns: use "append" action
- For arrays: use "append" action
- For simple fields: use "replace" action
- Propose a new card only for a person not already covered by an existing card
- If the session has no reliable signal, return a low batch confidence

Do not include any text outside of JSON."#
    )
}

fn existing_cards_summary(
    self_card: Option<&SelfCard>,
    characters: &[CharacterCard],
    events: &[WorldEventCard],
) -> String {
    let mut lines = Vec::new();

    if let Some(card) = self_card {
        let data = &card.payload["data"];
        lines.push(format!("Self Card (id={}):", card.id));
        lines.push(format!(
            "  Personality: {}",
            data["personality"].as_str().unwrap_or("N/A")
        ));
        lines.push(format!(
            "  Traits: {}",
            data["traits"]
                .as_array()
                .map(|a| a
                    .iter()
                    .filter_map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", "))
                .unwrap_or_default()
        ));
        lines.push(String::new());
    }

    for card in characters {
        let data = &card.payload["data"];
        lines.push(format!(
            "Character Card '{}' (id={}):",
            card.display_name, card.id
        ));
        lines.push(format!(
            "  Personality: {}",
            data["personality"].as_str().unwrap_or("N/A")
        ));
        let pattern_count = data["patterns"].as_array().map(|a| a.len()).unwrap_or(0);
        lines.push(format!("  Patterns: {} patterns", pattern_count));
        lines.push(String::new());
    }

    for event in events {
        lines.push(format!("World Event '{}' (id={}):", event.title, event.id));
        let description: String = event.description.chars().take(100).collect();
        lines.push(format!("  Description: {}...", description));
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RelationshipCategory, Speaker};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_prompt_includes_transcript_and_summary() {
        let messages = vec![ChatMessage {
            id: 1,
            session_id: 1,
            role: "user".to_string(),
            speaker: Speaker::Client,
            content: "My mom has been supportive".to_string(),
            created_at: Utc::now(),
        }];
        let card = CharacterCard {
            id: 12,
            owner_id: 1,
            display_name: "Mom".to_string(),
            relationship_category: RelationshipCategory::Family,
            relationship_label: None,
            payload: json!({"data": {"personality": "Caring", "patterns": [{"pattern": "calls often"}]}}),
            auto_update_enabled: true,
            is_pinned: false,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        };

        let prompt = build_update_prompt(&messages, None, &[card], &[]);
        assert!(prompt.contains("User: My mom has been supportive"));
        assert!(prompt.contains("Character Card 'Mom' (id=12):"));
        assert!(prompt.contains("Personality: Caring"));
        assert!(prompt.contains("Patterns: 1 patterns"));
    }
}
