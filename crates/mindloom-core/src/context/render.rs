//! Prose rendering of a context bundle for LLM system prompts.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::metadata;
use crate::types::{MemoryCard, METADATA_KEY};

use super::ContextBundle;

const SELF_HEADING: &str = "## About You";
const PINNED_HEADING: &str = "## People & Events Kept in Mind";
const CURRENT_HEADING: &str = "## Currently Discussing";
const RECENT_HEADING: &str = "## Recently Referenced";

/// Render the bundle to prose for injection into a system prompt.
///
/// Self card first, then pinned, current mentions, and recent cards, each
/// under a fixed heading. Every scalar field is suffixed with its recency
/// label when the card tracks one.
pub fn render_context(bundle: &ContextBundle, now: DateTime<Utc>) -> String {
    let mut sections = Vec::new();

    if let Some(self_card) = &bundle.self_card {
        let mut out = String::from(SELF_HEADING);
        out.push('\n');
        render_payload(&self_card.payload, now, &mut out);
        sections.push(out);
    }

    for (heading, cards) in [
        (PINNED_HEADING, &bundle.pinned),
        (CURRENT_HEADING, &bundle.current_mentions),
        (RECENT_HEADING, &bundle.recent),
    ] {
        if cards.is_empty() {
            continue;
        }
        let mut out = String::from(heading);
        out.push('\n');
        for card in cards {
            render_card(card, now, &mut out);
        }
        sections.push(out);
    }

    sections.join("\n")
}

fn render_card(card: &MemoryCard, now: DateTime<Utc>, out: &mut String) {
    let name = match card {
        MemoryCard::SelfCard(_) => "You".to_string(),
        MemoryCard::Character(c) => match &c.relationship_label {
            Some(label) => format!("{} ({})", c.display_name, label),
            None => format!("{} ({})", c.display_name, c.relationship_category),
        },
        MemoryCard::World(e) => e.title.clone(),
    };
    out.push_str(&format!("### {}\n", name));
    render_payload(&card.context_payload(), now, out);
}

fn render_payload(payload: &Value, now: DateTime<Utc>, out: &mut String) {
    let data = payload.get("data").cloned().unwrap_or(Value::Null);
    render_value(payload, &data, "", now, out);
}

fn render_value(card: &Value, value: &Value, path: &str, now: DateTime<Utc>, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == METADATA_KEY {
                    continue;
                }
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                render_value(card, child, &child_path, now, out);
            }
        }
        Value::Array(items) => {
            let scalars: Vec<String> = items
                .iter()
                .filter(|i| !matches!(i, Value::Object(_) | Value::Array(_)))
                .map(render_scalar)
                .collect();
            if scalars.len() == items.len() {
                // Uniform scalar list renders on one line.
                if !scalars.is_empty() {
                    out.push_str(&format!("- {}: {}\n", path, scalars.join(", ")));
                }
            } else {
                for (i, item) in items.iter().enumerate() {
                    render_value(card, item, &format!("{}[{}]", path, i), now, out);
                }
            }
        }
        Value::Null => {}
        scalar => {
            let rendered = render_scalar(scalar);
            match metadata::recency_label(card, path, now) {
                Some(label) => out.push_str(&format!("- {}: {} [{}]\n", path, rendered, label)),
                None => out.push_str(&format!("- {}: {}\n", path, rendered)),
            }
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
