//! Typed merge policies for card field updates.
//!
//! Each known field has a policy fixed at schema-definition time; the
//! LLM-proposed action is only trusted for fields the schema does not know.
//! Type mismatches skip the field instead of guessing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CardKind;

/// Action proposed by the LLM for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Replace,
    Merge,
    Append,
}

/// How a field is merged when the updater writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Overwrite unconditionally.
    Replace,
    /// Comma-separated trait strings: dedup case-insensitively, old order
    /// first, capitalized.
    MergeString,
    /// List concatenation without dedup.
    AppendList,
    /// List append deduplicated by lower-cased `pattern` string.
    AppendDedupList,
}

/// Schema-declared policy for a known field, if any.
pub fn schema_policy(kind: CardKind, field: &str) -> Option<MergePolicy> {
    match kind {
        CardKind::World => match field {
            "description" | "key_array" => Some(MergePolicy::Replace),
            _ => None,
        },
        CardKind::SelfCard | CardKind::Character => match field {
            "personality" => Some(MergePolicy::MergeString),
            "patterns" => Some(MergePolicy::AppendDedupList),
            "traits" | "interests" | "values" | "strengths" | "challenges" | "goals"
            | "triggers" | "coping_strategies" | "current_themes" | "key_events"
            | "user_feelings" => Some(MergePolicy::AppendList),
            "name" | "summary" | "relationship_type" => Some(MergePolicy::Replace),
            _ => None,
        },
    }
}

/// Resolve the effective policy for a field: the schema wins, the proposed
/// action covers unknown fields.
pub fn resolve_policy(kind: CardKind, field: &str, action: UpdateAction) -> MergePolicy {
    schema_policy(kind, field).unwrap_or(match action {
        UpdateAction::Replace => MergePolicy::Replace,
        UpdateAction::Merge => MergePolicy::MergeString,
        UpdateAction::Append => {
            if field == "patterns" {
                MergePolicy::AppendDedupList
            } else {
                MergePolicy::AppendList
            }
        }
    })
}

/// Default value for a field being created by an update. Lists for appends
/// and list values, mappings for mapping values, empty string otherwise.
pub fn default_for(policy: MergePolicy, incoming: &Value) -> Value {
    match policy {
        MergePolicy::AppendList | MergePolicy::AppendDedupList => Value::Array(vec![]),
        _ if incoming.is_array() => Value::Array(vec![]),
        _ if incoming.is_object() => Value::Object(Default::default()),
        _ => Value::String(String::new()),
    }
}

/// Apply a policy to an old value, producing the merged value, or `None`
/// when the value shapes don't fit the policy.
pub fn apply(policy: MergePolicy, old: &Value, incoming: &Value) -> Option<Value> {
    match policy {
        MergePolicy::Replace => Some(incoming.clone()),
        MergePolicy::MergeString => match (old.as_str(), incoming.as_str()) {
            (Some(old), Some(incoming)) => Some(Value::String(merge_traits(old, incoming))),
            _ => None,
        },
        MergePolicy::AppendList => match (old.as_array(), incoming.as_array()) {
            (Some(old), Some(incoming)) => {
                let mut merged = old.clone();
                merged.extend(incoming.iter().cloned());
                Some(Value::Array(merged))
            }
            _ => None,
        },
        MergePolicy::AppendDedupList => match (old.as_array(), incoming.as_array()) {
            (Some(old), Some(incoming)) => {
                Some(Value::Array(append_dedup_patterns(old, incoming)))
            }
            _ => None,
        },
    }
}

/// Merge comma-separated trait strings with case-insensitive dedup,
/// preserving old-then-new order and capitalizing each token.
pub fn merge_traits(old: &str, incoming: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    for source in [old, incoming] {
        for token in source.split(',') {
            let token = token.trim().to_lowercase();
            if !token.is_empty() && !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }

    tokens
        .iter()
        .map(|t| capitalize(t))
        .collect::<Vec<_>>()
        .join(", ")
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Append pattern objects, deduplicated by lower-cased `pattern` string.
fn append_dedup_patterns(old: &[Value], incoming: &[Value]) -> Vec<Value> {
    let pattern_key = |item: &Value| {
        item.get("pattern")
            .and_then(|p| p.as_str())
            .map(|p| p.to_lowercase())
    };

    let mut existing: Vec<String> = old.iter().filter_map(&pattern_key).collect();
    let mut merged = old.to_vec();

    for item in incoming {
        match pattern_key(item) {
            Some(key) if !key.is_empty() => {
                if !existing.contains(&key) {
                    existing.push(key);
                    merged.push(item.clone());
                }
            }
            _ => {}
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_traits_dedup_and_capitalize() {
        let merged = merge_traits("curious, kind", "kind, brave");
        assert_eq!(merged, "Curious, Kind, Brave");
    }

    #[test]
    fn test_merge_traits_idempotent() {
        let once = merge_traits("curious, kind", "kind, brave");
        let twice = merge_traits(&once, "kind, brave");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_traits_case_insensitive() {
        let merged = merge_traits("Curious", "CURIOUS, bold");
        assert_eq!(merged, "Curious, Bold");
    }

    #[test]
    fn test_pattern_append_dedup() {
        let old = json!([{"pattern": "Worries A Lot"}]);
        let incoming = json!([{"pattern": "worries a lot"}, {"pattern": "avoids conflict"}]);

        let merged = apply(
            MergePolicy::AppendDedupList,
            &old,
            &incoming,
        )
        .unwrap();

        let items = merged.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["pattern"], "avoids conflict");
    }

    #[test]
    fn test_append_without_dedup() {
        let old = json!(["a", "b"]);
        let incoming = json!(["b", "c"]);
        let merged = apply(MergePolicy::AppendList, &old, &incoming).unwrap();
        assert_eq!(merged, json!(["a", "b", "b", "c"]));
    }

    #[test]
    fn test_type_mismatch_skips() {
        assert!(apply(MergePolicy::MergeString, &json!(["list"]), &json!("str")).is_none());
        assert!(apply(MergePolicy::AppendList, &json!("str"), &json!(["x"])).is_none());
    }

    #[test]
    fn test_schema_policy_world_events() {
        assert_eq!(
            schema_policy(CardKind::World, "description"),
            Some(MergePolicy::Replace)
        );
        assert_eq!(schema_policy(CardKind::World, "personality"), None);
    }

    #[test]
    fn test_resolve_policy_prefers_schema() {
        // The schema pins personality to MergeString even if the LLM says
        // replace.
        assert_eq!(
            resolve_policy(CardKind::Character, "personality", UpdateAction::Replace),
            MergePolicy::MergeString
        );
        // Unknown fields follow the proposed action.
        assert_eq!(
            resolve_policy(CardKind::Character, "nickname", UpdateAction::Replace),
            MergePolicy::Replace
        );
    }

    #[test]
    fn test_default_for_shapes() {
        assert_eq!(default_for(MergePolicy::AppendList, &json!("x")), json!([]));
        assert_eq!(default_for(MergePolicy::Replace, &json!(["x"])), json!([]));
        assert_eq!(default_for(MergePolicy::Replace, &json!({"a": 1})), json!({}));
        assert_eq!(default_for(MergePolicy::Replace, &json!("x")), json!(""));
    }
}
