//! Keyword-based entity detection for cards.
//!
//! No embeddings, no semantic search - names, labels, and relationship
//! keywords with word-boundary matching and light linguistic normalization.

mod lexicon;

pub use lexicon::Lexicon;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{CardKind, CharacterCard, DetectedMention, MatchKind, WorldEventCard};

static POSSESSIVE_S: Lazy<Regex> = Lazy::new(|| Regex::new(r"'s\b").unwrap());
static POSSESSIVE_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'\b").unwrap());

/// Keyword-based entity detection. Pure function of the card lists passed
/// in; never writes mentions itself.
pub struct EntityDetector {
    folds: Vec<(Regex, String)>,
}

impl EntityDetector {
    /// Build a detector from a lexicon, precompiling the fold rewrites.
    pub fn new(lexicon: &Lexicon) -> Self {
        let folds = lexicon
            .irregular_plurals
            .iter()
            .chain(lexicon.plural_folds.iter())
            .map(|(plural, singular)| {
                let pattern = format!(r"\b{}\b", regex::escape(plural));
                (Regex::new(&pattern).expect("fold pattern compiles"), singular.clone())
            })
            .collect();
        Self { folds }
    }

    /// Normalize text for matching: lowercase, strip possessives, fold
    /// plurals to singular.
    fn normalize(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = POSSESSIVE_S.replace_all(&text, "");
        let mut text = POSSESSIVE_BARE.replace_all(&text, "").into_owned();

        for (pattern, singular) in &self.folds {
            text = pattern.replace_all(&text, singular.as_str()).into_owned();
        }
        text
    }

    /// Check if needle appears as a whole word in haystack. Word boundaries
    /// prevent "achievement" from matching inside "overachievements".
    fn word_boundary_match(needle: &str, haystack: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        let pattern = format!(r"\b{}\b", regex::escape(needle));
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(haystack),
            Err(_) => haystack.contains(needle),
        }
    }

    /// Detect which cards are plausibly referenced in a message.
    ///
    /// Matching per card, first rule wins: name/title, then custom
    /// relationship label, then category keywords (characters) or event
    /// keywords then event type (world events). Output is deduplicated by
    /// (card, kind), tagged with the first matching rule.
    pub fn detect(
        &self,
        text: &str,
        characters: &[CharacterCard],
        events: &[WorldEventCard],
        lexicon: &Lexicon,
    ) -> Vec<DetectedMention> {
        let normalized = self.normalize(text);
        let mut mentions: Vec<DetectedMention> = Vec::new();

        // Keywords claimed by a custom label are excluded from the broad
        // category pass, so labeling one sibling "Sister" does not drag every
        // family card along on the word "sister".
        let mut label_matched: Vec<String> = Vec::new();

        // First pass: names and labels.
        for card in characters {
            let name = card.display_name.to_lowercase();
            if Self::word_boundary_match(&name, &normalized) {
                mentions.push(DetectedMention {
                    card_id: card.id,
                    kind: CardKind::Character,
                    match_kind: MatchKind::Name,
                });
                continue;
            }

            if let Some(label) = &card.relationship_label {
                let label = label.to_lowercase();
                if Self::word_boundary_match(&label, &normalized) {
                    mentions.push(DetectedMention {
                        card_id: card.id,
                        kind: CardKind::Character,
                        match_kind: MatchKind::Label,
                    });
                    label_matched.push(label);
                }
            }
        }

        // Second pass: broad category keywords for cards not yet matched.
        for card in characters {
            if mentions.iter().any(|m| m.card_id == card.id && m.kind == CardKind::Character) {
                continue;
            }

            let matched = lexicon
                .keywords_for(card.relationship_category)
                .iter()
                .filter(|kw| !label_matched.contains(*kw))
                .any(|kw| Self::word_boundary_match(kw, &normalized));
            if matched {
                mentions.push(DetectedMention {
                    card_id: card.id,
                    kind: CardKind::Character,
                    match_kind: MatchKind::Keyword,
                });
            }
        }

        // World events: title, then keyword array, then event type.
        for event in events {
            let title = event.title.to_lowercase();
            if Self::word_boundary_match(&title, &normalized) {
                mentions.push(DetectedMention {
                    card_id: event.id,
                    kind: CardKind::World,
                    match_kind: MatchKind::Title,
                });
                continue;
            }

            let keyword_hit = event
                .keywords
                .iter()
                .any(|kw| Self::word_boundary_match(&kw.to_lowercase(), &normalized));
            if keyword_hit {
                mentions.push(DetectedMention {
                    card_id: event.id,
                    kind: CardKind::World,
                    match_kind: MatchKind::Keyword,
                });
                continue;
            }

            // Matches every event sharing the type, by design.
            let event_type = event.event_type.to_lowercase();
            if Self::word_boundary_match(&event_type, &normalized) {
                mentions.push(DetectedMention {
                    card_id: event.id,
                    kind: CardKind::World,
                    match_kind: MatchKind::EventType,
                });
            }
        }

        // Deduplicate by (card, kind), keeping the first match.
        let mut seen = std::collections::HashSet::new();
        mentions.retain(|m| seen.insert((m.card_id, m.kind)));
        mentions
    }
}
