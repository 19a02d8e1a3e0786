//! Context assembly for chat - loads relevant cards by tier.
//!
//! Loading priority, later tiers excluding records already included:
//! 1. Self card (always)
//! 2. Pinned cards (always)
//! 3. Cards mentioned in the current session
//! 4. Recent cards (mentioned in the last N distinct prior sessions)

mod render;

pub use render::render_context;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MindloomResult;
use crate::traits::CardStore;
use crate::types::{CardKind, CharacterCard, MemoryCard, SelfCard, WorldEventCard};

/// How many mentions to scan when computing current and recent tiers.
const MENTION_SCAN_LIMIT: usize = 100;

/// The bundle of cards loaded for one chat turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    pub self_card: Option<SelfCard>,
    pub pinned: Vec<MemoryCard>,
    pub current_mentions: Vec<MemoryCard>,
    pub recent: Vec<MemoryCard>,
    /// Sum of records actually included across all four tiers.
    pub total_count: usize,
}

/// Assembles a bounded, prioritized card bundle for LLM context.
pub struct ContextAssembler {
    store: Arc<dyn CardStore>,
    recent_session_limit: usize,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn CardStore>, recent_session_limit: usize) -> Self {
        Self {
            store,
            recent_session_limit,
        }
    }

    /// Assemble the context bundle for an owner and active session.
    pub async fn assemble(&self, owner_id: i64, session_id: i64) -> MindloomResult<ContextBundle> {
        let self_card = self.store.get_self_card(owner_id).await?;
        let pinned = self.store.get_pinned_cards(owner_id).await?;

        // Card lookup index for mention resolution.
        let characters = self.store.get_character_cards(owner_id).await?;
        let events = self.store.get_world_events(owner_id).await?;
        let index = CardIndex::new(&characters, &events);

        let mut included: HashSet<(CardKind, i64)> = HashSet::new();
        if let Some(card) = &self_card {
            included.insert((CardKind::SelfCard, card.id));
        }
        for card in &pinned {
            included.insert((card.kind(), card.id()));
        }

        let mentions = self.store.get_mentions(owner_id, MENTION_SCAN_LIMIT).await?;

        // Tier 3: cards mentioned in the current session.
        let mut current_mentions = Vec::new();
        for mention in mentions.iter().filter(|m| m.session_id == session_id) {
            let Some(card_id) = mention.card_id() else {
                continue;
            };
            if !included.insert((mention.kind, card_id)) {
                continue;
            }
            if let Some(card) = self.resolve(mention.kind, card_id, &index).await? {
                current_mentions.push(card);
            }
        }

        // Tier 4: cards from the last N distinct prior sessions, ordered by
        // most recent mention.
        let mut recent_sessions: Vec<i64> = Vec::new();
        for mention in &mentions {
            if mention.session_id == session_id {
                continue;
            }
            if !recent_sessions.contains(&mention.session_id) {
                recent_sessions.push(mention.session_id);
            }
        }
        recent_sessions.truncate(self.recent_session_limit);
        let window: HashSet<i64> = recent_sessions.into_iter().collect();

        let mut latest: HashMap<(CardKind, i64), DateTime<Utc>> = HashMap::new();
        for mention in &mentions {
            if !window.contains(&mention.session_id) {
                continue;
            }
            let Some(card_id) = mention.card_id() else {
                continue;
            };
            let key = (mention.kind, card_id);
            if included.contains(&key) {
                continue;
            }
            let entry = latest.entry(key).or_insert(mention.mentioned_at);
            if mention.mentioned_at > *entry {
                *entry = mention.mentioned_at;
            }
        }

        let mut ordered: Vec<((CardKind, i64), DateTime<Utc>)> = latest.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));

        let mut recent = Vec::new();
        for ((kind, card_id), _) in ordered {
            if let Some(card) = self.resolve(kind, card_id, &index).await? {
                recent.push(card);
            }
        }

        let total_count = self_card.is_some() as usize
            + pinned.len()
            + current_mentions.len()
            + recent.len();

        Ok(ContextBundle {
            self_card,
            pinned,
            current_mentions,
            recent,
            total_count,
        })
    }

    async fn resolve(
        &self,
        kind: CardKind,
        card_id: i64,
        index: &CardIndex,
    ) -> MindloomResult<Option<MemoryCard>> {
        match kind {
            CardKind::SelfCard => Ok(self
                .store
                .get_self_card_by_id(card_id)
                .await?
                .map(MemoryCard::SelfCard)),
            CardKind::Character => Ok(index.character(card_id).map(MemoryCard::Character)),
            CardKind::World => Ok(index.event(card_id).map(MemoryCard::World)),
        }
    }
}

struct CardIndex {
    characters: HashMap<i64, CharacterCard>,
    events: HashMap<i64, WorldEventCard>,
}

impl CardIndex {
    fn new(characters: &[CharacterCard], events: &[WorldEventCard]) -> Self {
        Self {
            characters: characters.iter().map(|c| (c.id, c.clone())).collect(),
            events: events.iter().map(|e| (e.id, e.clone())).collect(),
        }
    }

    fn character(&self, id: i64) -> Option<CharacterCard> {
        self.characters.get(&id).cloned()
    }

    fn event(&self, id: i64) -> Option<WorldEventCard> {
        self.events.get(&id).cloned()
    }
}
