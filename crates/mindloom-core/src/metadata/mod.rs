//! Field-level provenance metadata for cards.
//!
//! Every scalar leaf written into a card's `data` tree carries a metadata
//! entry under the reserved `_metadata` key, keyed by dot-notation path
//! (`emotional_state.user_to_other`) with bracketed indices for list
//! elements (`patterns[0].pattern`). The stored shape is a contract: it must
//! interoperate with existing card JSON.
//!
//! List elements are addressed by index and are not re-identified across
//! merges; reordering or removing list items leaves orphaned entries behind.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::METADATA_KEY;

/// Where a field value came from.
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
pub enum FieldSource {
    Llm,
    User,
}

/// Provenance for one field path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub update_count: u64,
    pub source: FieldSource,
}

fn metadata_map(card: &Value) -> Option<&serde_json::Map<String, Value>> {
    card.get(METADATA_KEY).and_then(|m| m.as_object())
}

fn metadata_map_mut(card: &mut Value) -> &mut serde_json::Map<String, Value> {
    let obj = card
        .as_object_mut()
        .expect("card payload must be a JSON object");
    obj.entry(METADATA_KEY.to_string())
        .or_insert_with(|| Value::Object(Default::default()))
        .as_object_mut()
        .expect("_metadata must be a JSON object")
}

fn get_field(card: &Value, path: &str) -> Option<FieldMetadata> {
    metadata_map(card)
        .and_then(|m| m.get(path))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn put_field(card: &mut Value, path: &str, meta: &FieldMetadata) {
    let value = serde_json::to_value(meta).expect("field metadata serializes");
    metadata_map_mut(card).insert(path.to_string(), value);
}

/// Initialize metadata for a single field path if none exists.
pub fn initialize_field(card: &mut Value, path: &str, source: FieldSource, now: DateTime<Utc>) {
    if get_field(card, path).is_none() {
        put_field(
            card,
            path,
            &FieldMetadata {
                first_seen: now,
                last_updated: now,
                update_count: 0,
                source,
            },
        );
    }
}

/// Touch a field path: initialize if absent, otherwise bump `last_updated`,
/// increment `update_count`, and record the new source.
pub fn touch_field(card: &mut Value, path: &str, source: FieldSource, now: DateTime<Utc>) {
    match get_field(card, path) {
        None => initialize_field(card, path, source, now),
        Some(mut meta) => {
            meta.last_updated = now;
            meta.update_count += 1;
            meta.source = source;
            put_field(card, path, &meta);
        }
    }
}

/// Touch a set of field paths.
pub fn touch_fields<'a>(
    card: &mut Value,
    paths: impl IntoIterator<Item = &'a str>,
    source: FieldSource,
    now: DateTime<Utc>,
) {
    for path in paths {
        touch_field(card, path, source, now);
    }
}

/// Reset every tracked field to `source=user`, bumping timestamps. Models a
/// full user edit invalidating all recency claims.
pub fn reset_all(card: &mut Value, now: DateTime<Utc>) {
    let paths: Vec<String> = metadata_map(card)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    for path in paths {
        touch_field(card, &path, FieldSource::User, now);
    }
}

/// Walk every scalar leaf under the card's `data` tree and initialize
/// metadata for any leaf that has none.
pub fn initialize_card(card: &mut Value, source: FieldSource, now: DateTime<Utc>) {
    let data = card.get("data").cloned().unwrap_or(Value::Null);
    let mut paths = Vec::new();
    collect_leaf_paths(&data, "", &mut paths);
    for path in paths {
        initialize_field(card, &path, source, now);
    }
}

fn collect_leaf_paths(value: &Value, path: &str, out: &mut Vec<String>) {
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
                match child {
                    Value::Object(_) | Value::Array(_) => {
                        collect_leaf_paths(child, &child_path, out)
                    }
                    _ => out.push(child_path),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if matches!(item, Value::Object(_) | Value::Array(_)) {
                    collect_leaf_paths(item, &format!("{}[{}]", path, i), out);
                }
            }
        }
        _ => {}
    }
}

/// Human-readable recency bucket for a field, or `None` when the field has
/// no metadata. Buckets are contiguous and non-overlapping.
pub fn recency_label(card: &Value, path: &str, now: DateTime<Utc>) -> Option<&'static str> {
    let meta = get_field(card, path)?;
    let age = now.signed_duration_since(meta.last_updated);

    let label = if age < Duration::hours(1) {
        "new"
    } else if age < Duration::days(1) {
        "updated today"
    } else if age < Duration::days(7) {
        "updated this week"
    } else if age < Duration::days(14) {
        "updated 2 weeks ago"
    } else if age < Duration::days(30) {
        "updated this month"
    } else {
        "established"
    };
    Some(label)
}

/// Age of a field in whole days since its last update.
pub fn field_age_days(card: &Value, path: &str, now: DateTime<Utc>) -> Option<i64> {
    let meta = get_field(card, path)?;
    Some(now.signed_duration_since(meta.last_updated).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_card() -> Value {
        json!({
            "data": {
                "name": "Mom",
                "personality": "Caring, supportive",
                "emotional_state": {
                    "user_to_other": { "trust": 80 }
                },
                "patterns": [
                    { "pattern": "worries a lot", "weight": 0.7 }
                ],
                "traits": ["kind", "loving"]
            }
        })
    }

    #[test]
    fn test_initialize_card_tracks_nested_leaves() {
        let mut card = sample_card();
        let now = Utc::now();
        initialize_card(&mut card, FieldSource::Llm, now);

        let meta = card[METADATA_KEY].as_object().unwrap();
        assert!(meta.contains_key("name"));
        assert!(meta.contains_key("personality"));
        assert!(meta.contains_key("emotional_state.user_to_other.trust"));
        assert!(meta.contains_key("patterns[0].pattern"));
        assert!(meta.contains_key("patterns[0].weight"));
        // Scalar list elements are not tracked per-element.
        assert!(!meta.contains_key("traits[0]"));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut card = sample_card();
        let t0 = Utc::now();
        initialize_card(&mut card, FieldSource::Llm, t0);
        let t1 = t0 + Duration::hours(5);
        initialize_card(&mut card, FieldSource::Llm, t1);

        let meta = get_field(&card, "name").unwrap();
        assert_eq!(meta.first_seen, t0);
        assert_eq!(meta.update_count, 0);
    }

    #[test]
    fn test_touch_bumps_count_and_source() {
        let mut card = sample_card();
        let t0 = Utc::now();
        initialize_card(&mut card, FieldSource::Llm, t0);

        let t1 = t0 + Duration::hours(2);
        touch_field(&mut card, "personality", FieldSource::Llm, t1);

        let meta = get_field(&card, "personality").unwrap();
        assert_eq!(meta.update_count, 1);
        assert_eq!(meta.last_updated, t1);
        assert_eq!(meta.first_seen, t0);
    }

    #[test]
    fn test_touch_unknown_path_initializes() {
        let mut card = sample_card();
        let now = Utc::now();
        touch_field(&mut card, "goals", FieldSource::Llm, now);

        let meta = get_field(&card, "goals").unwrap();
        assert_eq!(meta.update_count, 0);
        assert_eq!(meta.source, FieldSource::Llm);
    }

    #[test]
    fn test_reset_all_marks_user_source() {
        let mut card = sample_card();
        let t0 = Utc::now();
        initialize_card(&mut card, FieldSource::Llm, t0);

        let t1 = t0 + Duration::days(1);
        reset_all(&mut card, t1);

        let meta = get_field(&card, "name").unwrap();
        assert_eq!(meta.source, FieldSource::User);
        assert_eq!(meta.last_updated, t1);
        assert_eq!(meta.update_count, 1);
    }

    #[test]
    fn test_recency_buckets() {
        let mut card = sample_card();
        let t0 = Utc::now();
        initialize_card(&mut card, FieldSource::Llm, t0);

        let cases = [
            (Duration::minutes(30), "new"),
            (Duration::hours(5), "updated today"),
            (Duration::days(3), "updated this week"),
            (Duration::days(10), "updated 2 weeks ago"),
            (Duration::days(20), "updated this month"),
            (Duration::days(30), "established"),
            (Duration::days(400), "established"),
        ];
        for (age, expected) in cases {
            assert_eq!(recency_label(&card, "name", t0 + age), Some(expected));
        }
    }

    #[test]
    fn test_recency_label_missing_field() {
        let card = sample_card();
        assert_eq!(recency_label(&card, "nope", Utc::now()), None);
    }

    #[test]
    fn test_bucket_boundaries() {
        let mut card = sample_card();
        let t0 = Utc::now();
        initialize_card(&mut card, FieldSource::Llm, t0);

        // Exactly 1h falls into the next bucket; exactly 30d is established.
        assert_eq!(
            recency_label(&card, "name", t0 + Duration::hours(1)),
            Some("updated today")
        );
        assert_eq!(
            recency_label(&card, "name", t0 + Duration::days(14)),
            Some("updated this month")
        );
    }
}
