//! The memory engine facade.
//!
//! Bundles the detector, assembler, updater, and analyzers behind the
//! operations the chat and session-completion layers call. Chat-turn
//! operations degrade to empty results instead of failing the turn;
//! post-session analysis surfaces structured failures.

use std::sync::Arc;

use chrono::Utc;

use crate::config::CoreConfig;
use crate::context::{render_context, ContextAssembler, ContextBundle};
use crate::detect::{EntityDetector, Lexicon};
use crate::error::MindloomResult;
use crate::friendship::{FriendshipAnalyzer, FriendshipDelta};
use crate::insight::{InsightExtractor, SessionInsights};
use crate::metadata;
use crate::traits::{CardGenerator, CardStore, ChangedBy, Llm};
use crate::types::{CardKind, ChatMessage, DetectedMention};
use crate::update::{CardUpdater, UpdateOutcome};

/// Facade over the memory core.
pub struct MemoryEngine {
    store: Arc<dyn CardStore>,
    lexicon: Lexicon,
    detector: EntityDetector,
    assembler: ContextAssembler,
    updater: CardUpdater,
    friendship: FriendshipAnalyzer,
    insight: InsightExtractor,
}

impl MemoryEngine {
    pub fn new(
        config: CoreConfig,
        store: Arc<dyn CardStore>,
        llm: Arc<dyn Llm>,
        generator: Arc<dyn CardGenerator>,
    ) -> Self {
        Self::with_lexicon(config, store, llm, generator, Lexicon::default())
    }

    pub fn with_lexicon(
        config: CoreConfig,
        store: Arc<dyn CardStore>,
        llm: Arc<dyn Llm>,
        generator: Arc<dyn CardGenerator>,
        lexicon: Lexicon,
    ) -> Self {
        let detector = EntityDetector::new(&lexicon);
        let assembler = ContextAssembler::new(store.clone(), config.recent_card_session_limit);
        let updater = CardUpdater::new(store.clone(), llm.clone(), generator, config.clone());
        let friendship = FriendshipAnalyzer::new(llm.clone(), config.clone());
        let insight = InsightExtractor::new(llm, config);

        Self {
            store,
            lexicon,
            detector,
            assembler,
            updater,
            friendship,
            insight,
        }
    }

    /// Detect which cards a message references. Never fails the chat turn:
    /// store errors degrade to an empty result.
    pub async fn detect_mentions(&self, text: &str, owner_id: i64) -> Vec<DetectedMention> {
        let characters = match self.store.get_character_cards(owner_id).await {
            Ok(cards) => cards,
            Err(err) => {
                tracing::warn!("Mention detection degraded (characters): {}", err);
                return vec![];
            }
        };
        let events = match self.store.get_world_events(owner_id).await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!("Mention detection degraded (events): {}", err);
                return vec![];
            }
        };

        self.detector.detect(text, &characters, &events, &self.lexicon)
    }

    /// Persist one detected mention.
    pub async fn log_mention(
        &self,
        owner_id: i64,
        session_id: i64,
        kind: CardKind,
        card_id: i64,
        snippet: &str,
    ) -> MindloomResult<i64> {
        self.store
            .add_mention(
                owner_id,
                session_id,
                kind,
                &card_id.to_string(),
                snippet,
                Utc::now(),
            )
            .await
    }

    /// Assemble the card bundle for the next LLM turn. Never fails the chat
    /// turn: errors degrade to an empty bundle.
    pub async fn assemble_context(&self, owner_id: i64, session_id: i64) -> ContextBundle {
        match self.assembler.assemble(owner_id, session_id).await {
            Ok(bundle) => bundle,
            Err(err) => {
                tracing::warn!("Context assembly degraded to empty: {}", err);
                ContextBundle::default()
            }
        }
    }

    /// Render a bundle to prose for the system prompt.
    pub fn render_context(&self, bundle: &ContextBundle) -> String {
        render_context(bundle, Utc::now())
    }

    /// Post-session card analysis and update.
    pub async fn analyze_and_update(
        &self,
        owner_id: i64,
        session_id: i64,
        messages: &[ChatMessage],
    ) -> MindloomResult<UpdateOutcome> {
        self.updater
            .analyze_and_update(owner_id, session_id, messages)
            .await
    }

    /// Post-session friendship scoring. `None` means no score; treat as a
    /// no-op.
    pub async fn analyze_friendship(
        &self,
        messages: &[ChatMessage],
        counselor_name: &str,
        current_level: u8,
        current_points: i64,
    ) -> Option<FriendshipDelta> {
        self.friendship
            .analyze(messages, counselor_name, current_level, current_points)
            .await
    }

    /// Post-session clinical insight extraction. `None` means no insights.
    pub async fn extract_insights(
        &self,
        messages: &[ChatMessage],
        client_profile: &serde_json::Value,
        dimensions: &[String],
        session_number: u32,
        duration_minutes: u32,
    ) -> Option<SessionInsights> {
        self.insight
            .extract(
                messages,
                client_profile,
                dimensions,
                session_number,
                duration_minutes,
            )
            .await
    }

    /// Apply a full user edit to a self or character card: the payload is
    /// replaced wholesale and every field's metadata resets to `source=user`.
    pub async fn apply_user_edit(
        &self,
        kind: CardKind,
        card_id: i64,
        mut payload: serde_json::Value,
    ) -> MindloomResult<()> {
        let now = Utc::now();
        metadata::initialize_card(&mut payload, metadata::FieldSource::User, now);
        metadata::reset_all(&mut payload, now);

        match kind {
            CardKind::SelfCard => {
                self.store
                    .update_self_card(card_id, payload, ChangedBy::User)
                    .await
            }
            CardKind::Character => {
                self.store
                    .update_character_card(card_id, payload, ChangedBy::User)
                    .await
            }
            CardKind::World => Err(crate::error::MindloomError::validation(
                "World events are edited field-by-field, not as a payload",
            )),
        }
    }
}
