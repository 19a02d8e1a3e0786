//! Matching lexicon: relationship keyword tables and plural folding.
//!
//! Injectable so tests can substitute fixtures and locale variants can be
//! plugged in. Defaults reproduce the production tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::RelationshipCategory;

/// Keyword tables and normalization rules used by the entity detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Broad keywords per relationship category.
    pub category_keywords: BTreeMap<RelationshipCategory, Vec<String>>,
    /// Irregular plural → singular rewrites (wives → wife).
    pub irregular_plurals: Vec<(String, String)>,
    /// Common plural → singular rewrites applied word-by-word.
    pub plural_folds: Vec<(String, String)>,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        let mut category_keywords = BTreeMap::new();
        category_keywords.insert(
            RelationshipCategory::Family,
            strings(&[
                "mom",
                "mother",
                "mama",
                "mum",
                "mommy",
                "dad",
                "father",
                "papa",
                "pop",
                "daddy",
                "parent",
                "parents",
                "brother",
                "sister",
                "sibling",
                "siblings",
                "grandmother",
                "grandma",
                "grandfather",
                "grandpa",
                "grandparent",
                "grandparents",
                "aunt",
                "uncle",
                "cousin",
                "niece",
                "nephew",
            ]),
        );
        category_keywords.insert(
            RelationshipCategory::Friend,
            strings(&[
                "friend",
                "friends",
                "best friend",
                "bestfriend",
                "buddy",
                "pal",
                "bff",
                "homie",
            ]),
        );
        category_keywords.insert(
            RelationshipCategory::Romantic,
            strings(&[
                "partner",
                "boyfriend",
                "bf",
                "girlfriend",
                "gf",
                "wife",
                "husband",
                "spouse",
                "fiancé",
                "fiancée",
                "significant other",
                "so",
            ]),
        );
        category_keywords.insert(
            RelationshipCategory::Coworker,
            strings(&[
                "boss",
                "manager",
                "supervisor",
                "director",
                "coworker",
                "coworkers",
                "colleague",
                "colleagues",
                "teammate",
                "teammates",
                "teacher",
                "professor",
                "instructor",
                "coach",
                "mentor",
            ]),
        );

        Self {
            category_keywords,
            irregular_plurals: pairs(&[("wives", "wife"), ("lives", "life")]),
            plural_folds: pairs(&[
                ("bosses", "boss"),
                ("colleagues", "colleague"),
                ("coaches", "coach"),
                ("universities", "university"),
                ("activities", "activity"),
                ("friends", "friend"),
                ("parents", "parent"),
                ("siblings", "sibling"),
                ("cousins", "cousin"),
                ("teachers", "teacher"),
                ("classmates", "classmate"),
                ("teammates", "teammate"),
                ("neighbors", "neighbor"),
                ("kids", "kid"),
                ("boys", "boy"),
                ("girls", "girl"),
                ("achievements", "achievement"),
                ("colleges", "college"),
                ("goals", "goal"),
            ]),
        }
    }
}

impl Lexicon {
    /// Keywords for a relationship category. Unlisted categories match
    /// nothing (e.g. `other`).
    pub fn keywords_for(&self, category: RelationshipCategory) -> &[String] {
        self.category_keywords
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_cover_categories() {
        let lexicon = Lexicon::default();
        assert!(lexicon
            .keywords_for(RelationshipCategory::Family)
            .contains(&"sister".to_string()));
        assert!(lexicon
            .keywords_for(RelationshipCategory::Coworker)
            .contains(&"boss".to_string()));
        assert!(lexicon.keywords_for(RelationshipCategory::Other).is_empty());
    }
}
