//! Cleanup utilities for JSON embedded in LLM responses.
//!
//! LLMs wrap JSON in markdown fences, leave trailing commas, and sometimes
//! use single quotes. Every parser in this crate goes through these helpers
//! before `serde_json`.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").unwrap());
static THINK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static TRAILING_COMMA_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());
static TRAILING_COMMA_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());

/// Extract JSON from a potentially fenced response and strip thinking tags
/// and trailing commas.
pub fn clean_json(text: &str) -> String {
    let text = THINK_TAGS.replace_all(text.trim(), "");
    let text = text.trim();

    let inner = match CODE_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => text,
    };

    let fixed = TRAILING_COMMA_BRACE.replace_all(inner, "}");
    let fixed = TRAILING_COMMA_BRACKET.replace_all(&fixed, "]");
    fixed.into_owned()
}

/// Parse a value out of an LLM response, applying cleanup first and a
/// single-quote fallback on failure. Returns `None` when nothing parses.
pub fn parse_lenient<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let cleaned = clean_json(text);
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(parsed) = serde_json::from_str(&cleaned) {
        return Some(parsed);
    }

    let requoted = cleaned.replace('\'', "\"");
    serde_json::from_str(&requoted).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_from_code_block() {
        let input = "```json\n{\"confidence\": 0.9}\n```";
        assert_eq!(clean_json(input), "{\"confidence\": 0.9}");
    }

    #[test]
    fn test_clean_json_bare() {
        let input = "  {\"a\": 1}  ";
        assert_eq!(clean_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_strips_trailing_commas() {
        let input = "{\"items\": [1, 2,], \"x\": 1,}";
        assert_eq!(clean_json(input), "{\"items\": [1, 2], \"x\": 1}");
    }

    #[test]
    fn test_clean_json_strips_think_tags() {
        let input = "<think>hmm</think>{\"a\": 1}";
        assert_eq!(clean_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_lenient_valid() {
        #[derive(serde::Deserialize)]
        struct Out {
            confidence: f64,
        }
        let out: Out = parse_lenient("```json\n{\"confidence\": 0.8,}\n```").unwrap();
        assert_eq!(out.confidence, 0.8);
    }

    #[test]
    fn test_parse_lenient_garbage_returns_none() {
        let out: Option<serde_json::Value> = parse_lenient("not json at all");
        assert!(out.is_none());
    }
}
