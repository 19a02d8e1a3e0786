//! Prompt templates for card generation.

use crate::types::CardKind;

/// Build the generation prompt for a card kind.
pub fn build_prompt(
    kind: CardKind,
    plain_text: &str,
    context: Option<&str>,
    name: Option<&str>,
) -> String {
    let context_section = context
        .map(|c| format!("\nCONTEXT:\n---\n{}\n", c))
        .unwrap_or_default();
    let name_section = match (kind, name) {
        (CardKind::Character, Some(name)) => format!("\nNAME:\n---\n{}\n", name),
        _ => String::new(),
    };

    match kind {
        CardKind::SelfCard => format!(
            r#"You are a card generator for a therapeutic storytelling app.

Convert this plain text description into a structured self-card:

PLAIN TEXT:
---
{plain_text}
{context_section}

Output ONLY valid JSON in this format:
{{
  "spec": "mindloom_self_card_v1",
  "spec_version": "1.0",
  "data": {{
    "name": "optional_display_name",
    "summary": "1-2 sentence overview",
    "personality": "Short description",
    "traits": ["trait1", "trait2"],
    "interests": ["interest1", "interest2"],
    "values": ["value1", "value2"],
    "strengths": ["strength1", "strength2"],
    "challenges": ["challenge1", "challenge2"],
    "goals": [
      {{"goal": "...", "timeframe": "..."}}
    ],
    "triggers": ["trigger1", "trigger2"],
    "coping_strategies": ["strategy1", "strategy2"],
    "patterns": [
      {{"pattern": "...", "weight": 0.0-1.0, "mentions": 1}}
    ],
    "current_themes": ["theme1", "theme2"],
    "risk_flags": {{
      "crisis": false,
      "self_harm_history": false,
      "substance_misuse_concern": false,
      "notes": null
    }}
  }}
}}

Do not include any text outside of JSON."#
        ),
        CardKind::Character => format!(
            r#"You are a card generator for a therapeutic storytelling app.

Convert this plain text description into a structured character card:

PLAIN TEXT:
---
{plain_text}
{context_section}{name_section}

Output ONLY valid JSON in this format:
{{
  "spec": "mindloom_character_card_v1",
  "spec_version": "1.0",
  "data": {{
    "name": "...",
    "relationship_type": "family|friend|coworker|romantic|other",
    "personality": "...",
    "patterns": [
      {{"pattern": "...", "weight": 0.0-1.0, "mentions": 1}}
    ],
    "key_events": [
      {{"event": "...", "date": "...", "impact": "..."}}
    ],
    "user_feelings": [
      {{"feeling": "...", "weight": 0.0-1.0}}
    ],
    "emotional_state": {{
      "user_to_other": {{
        "trust": 0-100,
        "emotional_bond": 0-100,
        "conflict": 0-100,
        "power_dynamic": -100 to 100,
        "fear_anxiety": 0-100
      }},
      "other_to_user": null
    }}
  }}
}}

Do not include any text outside of JSON."#
        ),
        CardKind::World => format!(
            r#"You are a card generator for a therapeutic storytelling app.

Convert this plain text description into a structured world event card:

PLAIN TEXT:
---
{plain_text}
{context_section}

Output ONLY valid JSON in this format:
{{
  "title": "...",
  "event_type": "achievement|trauma|transition|unresolved",
  "key_array": ["keyword1", "keyword2", ...],
  "description": "[Event: type(...)]",
  "resolved": true|false
}}

Do not include any text outside of JSON."#
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_prompt_includes_name_section() {
        let prompt = build_prompt(CardKind::Character, "my sister", None, Some("Paula"));
        assert!(prompt.contains("NAME:\n---\nPaula"));
        assert!(prompt.contains("character card"));
    }

    #[test]
    fn test_self_prompt_ignores_name() {
        let prompt = build_prompt(CardKind::SelfCard, "about me", None, Some("ignored"));
        assert!(!prompt.contains("NAME:"));
        assert!(prompt.contains("mindloom_self_card_v1"));
    }

    #[test]
    fn test_context_section_present_when_given() {
        let prompt = build_prompt(CardKind::World, "a big move", Some("relocated for work"), None);
        assert!(prompt.contains("CONTEXT:\n---\nrelocated for work"));
    }
}
