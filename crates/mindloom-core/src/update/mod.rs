//! Invisible auto-update for self cards, character cards, and world events.
//!
//! Analyzes a completed session transcript and applies LLM-proposed diffs.
//! A diff is applied only when the batch confidence clears
//! `batch_confidence_threshold`, the target card has auto-update enabled and
//! no user edit newer than the last system write, and the field confidence
//! clears `field_confidence_threshold`.

pub mod merge;
mod prompt;
mod response;

pub use merge::{MergePolicy, UpdateAction};
pub use response::{BatchProposal, FieldDiff, NewCardProposal, RecordProposal};

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::CoreConfig;
use crate::error::MindloomResult;
use crate::metadata::{self, FieldSource};
use crate::retry::with_retry;
use crate::telemetry::{hash_id, record_operation};
use crate::traits::{CardGenerator, CardStore, ChangedBy, GenerationOptions, Llm};
use crate::types::{
    format_messages, CardKind, CharacterCard, ChatMessage, Message, OperationStatus,
    RelationshipCategory, WorldEventCard,
};

const OPERATION: &str = "card_update";

/// One applied card change.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedChange {
    pub card_id: i64,
    pub kind: CardKind,
    pub fields_updated: Vec<String>,
}

/// Outcome of one updater invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateOutcome {
    pub records_updated: usize,
    pub records_skipped: usize,
    pub changes: Vec<AppliedChange>,
    pub new_cards_created: usize,
}

/// Post-session card updater.
pub struct CardUpdater {
    store: Arc<dyn CardStore>,
    llm: Arc<dyn Llm>,
    generator: Arc<dyn CardGenerator>,
    config: CoreConfig,
}

impl CardUpdater {
    pub fn new(
        store: Arc<dyn CardStore>,
        llm: Arc<dyn Llm>,
        generator: Arc<dyn CardGenerator>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            llm,
            generator,
            config,
        }
    }

    /// Analyze a session transcript and apply updates invisibly.
    ///
    /// A malformed LLM response degrades to zero changes; LLM transport
    /// failures (after retries) surface to the caller. Either way the
    /// invocation records a telemetry row.
    pub async fn analyze_and_update(
        &self,
        owner_id: i64,
        session_id: i64,
        messages: &[ChatMessage],
    ) -> MindloomResult<UpdateOutcome> {
        let started = Instant::now();

        self.bootstrap_self_card(owner_id, messages).await;

        let self_card = self.store.get_self_card(owner_id).await?;
        let characters = self.store.get_character_cards(owner_id).await?;
        let events = self.store.get_world_events(owner_id).await?;

        let prompt_text =
            prompt::build_update_prompt(messages, self_card.as_ref(), &characters, &events);
        let attempts = AtomicU32::new(0);

        let llm_result = with_retry(&self.config.retry, OPERATION, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            let response = self
                .llm
                .generate(
                    &[Message::system(prompt_text.clone())],
                    Some(GenerationOptions::new(self.config.llm.temperature, 2000)),
                )
                .await?;
            Ok(response.content.unwrap_or_default())
        })
        .await;
        let attempts = attempts.load(Ordering::SeqCst);

        let content = match llm_result {
            Ok(content) => content,
            Err(err) => {
                record_operation(
                    self.store.as_ref(),
                    OPERATION,
                    started,
                    OperationStatus::Error,
                    Some(err.to_string()),
                    self.base_metadata(owner_id, session_id, attempts),
                )
                .await;
                return Err(err);
            }
        };

        let Some(proposal) = response::parse_batch_proposal(&content) else {
            tracing::warn!("Card update response did not parse; applying zero updates");
            record_operation(
                self.store.as_ref(),
                OPERATION,
                started,
                OperationStatus::Error,
                Some("Failed to parse update response".to_string()),
                self.base_metadata(owner_id, session_id, attempts),
            )
            .await;
            return Ok(UpdateOutcome::default());
        };

        if proposal.confidence < self.config.batch_confidence_threshold {
            tracing::debug!(
                "Batch confidence {} below threshold {}",
                proposal.confidence,
                self.config.batch_confidence_threshold
            );
            let mut metadata = self.base_metadata(owner_id, session_id, attempts);
            metadata["batch_confidence"] = json!(proposal.confidence);
            record_operation(
                self.store.as_ref(),
                OPERATION,
                started,
                OperationStatus::Skipped,
                Some("Batch confidence below threshold".to_string()),
                metadata,
            )
            .await;
            return Ok(UpdateOutcome::default());
        }

        let mut outcome = UpdateOutcome::default();
        let now = Utc::now();

        for record in &proposal.updates {
            let auto_enabled = match record.card_type {
                CardKind::SelfCard => self_card
                    .iter()
                    .find(|c| c.id == record.card_id)
                    .map(|c| c.auto_update_enabled),
                CardKind::Character => characters
                    .iter()
                    .find(|c| c.id == record.card_id)
                    .map(|c| c.auto_update_enabled),
                CardKind::World => events
                    .iter()
                    .find(|e| e.id == record.card_id)
                    .map(|e| e.auto_update_enabled),
            };

            if self
                .should_skip_card(record.card_type, record.card_id, auto_enabled)
                .await
            {
                outcome.records_skipped += 1;
                continue;
            }

            let applied = match record.card_type {
                CardKind::SelfCard => {
                    self.apply_payload_update(
                        record,
                        self_card
                            .iter()
                            .find(|c| c.id == record.card_id)
                            .map(|c| (c.id, c.payload.clone())),
                        now,
                    )
                    .await?
                }
                CardKind::Character => {
                    self.apply_payload_update(
                        record,
                        characters
                            .iter()
                            .find(|c| c.id == record.card_id)
                            .map(|c| (c.id, c.payload.clone())),
                        now,
                    )
                    .await?
                }
                CardKind::World => {
                    self.apply_world_update(
                        record,
                        events.iter().find(|e| e.id == record.card_id),
                    )
                    .await?
                }
            };

            if applied.is_empty() {
                continue;
            }
            outcome.records_updated += 1;
            outcome.changes.push(AppliedChange {
                card_id: record.card_id,
                kind: record.card_type,
                fields_updated: applied,
            });
        }

        outcome.new_cards_created = self
            .create_new_cards(owner_id, &proposal.new_cards, &characters, now)
            .await?;

        let mut metadata = self.base_metadata(owner_id, session_id, attempts);
        metadata["cards_updated"] = json!(outcome.records_updated);
        metadata["cards_skipped"] = json!(outcome.records_skipped);
        metadata["new_cards_created"] = json!(outcome.new_cards_created);
        record_operation(
            self.store.as_ref(),
            OPERATION,
            started,
            OperationStatus::Success,
            None,
            metadata,
        )
        .await;

        Ok(outcome)
    }

    /// Synthesize the owner's self card from the transcript when none exists.
    /// Generation failures are swallowed; the rest of the pipeline proceeds.
    async fn bootstrap_self_card(&self, owner_id: i64, messages: &[ChatMessage]) {
        let existing = match self.store.get_self_card(owner_id).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!("Self card lookup failed during bootstrap: {}", err);
                return;
            }
        };
        if existing.is_some() {
            return;
        }

        let transcript = format_messages(messages);
        match self
            .generator
            .generate(CardKind::SelfCard, &transcript, None, None)
            .await
        {
            Ok(generated) => {
                if let Err(err) = self
                    .store
                    .create_self_card(owner_id, generated.card, true)
                    .await
                {
                    tracing::warn!("Failed to persist bootstrapped self card: {}", err);
                }
            }
            Err(err) => {
                tracing::debug!("Self card bootstrap generation failed: {}", err);
            }
        }
    }

    /// Skip when the card is unknown, auto-update is off, or the user edited
    /// the card after the last system write.
    async fn should_skip_card(
        &self,
        kind: CardKind,
        card_id: i64,
        auto_enabled: Option<bool>,
    ) -> bool {
        match auto_enabled {
            Some(true) => {}
            Some(false) | None => return true,
        }

        let last_system = self
            .store
            .last_edit_by(kind, card_id, ChangedBy::System)
            .await
            .ok()
            .flatten();
        let last_user = self
            .store
            .last_edit_by(kind, card_id, ChangedBy::User)
            .await
            .ok()
            .flatten();

        match (last_user, last_system) {
            (Some(_), None) => true,
            (Some(user), Some(system)) => user > system,
            (None, _) => false,
        }
    }

    /// Apply payload-envelope diffs (self and character cards). Returns the
    /// list of fields actually changed.
    async fn apply_payload_update(
        &self,
        record: &RecordProposal,
        card: Option<(i64, Value)>,
        now: DateTime<Utc>,
    ) -> MindloomResult<Vec<String>> {
        let Some((card_id, mut payload)) = card else {
            return Ok(vec![]);
        };

        if !payload.get("data").map(|d| d.is_object()).unwrap_or(false) {
            payload["data"] = json!({});
        }

        let mut applied = Vec::new();
        for diff in &record.updates {
            if diff.confidence < self.config.field_confidence_threshold {
                tracing::debug!(
                    "Field '{}' confidence {} below threshold",
                    diff.field,
                    diff.confidence
                );
                continue;
            }

            let policy = merge::resolve_policy(record.card_type, &diff.field, diff.action);
            let data = payload["data"].as_object_mut().expect("data is an object");
            let old = data
                .get(&diff.field)
                .cloned()
                .unwrap_or_else(|| merge::default_for(policy, &diff.value));

            if let Some(merged) = merge::apply(policy, &old, &diff.value) {
                data.insert(diff.field.clone(), merged);
                applied.push(diff.field.clone());
            }
        }

        if applied.is_empty() {
            return Ok(vec![]);
        }

        metadata::touch_fields(
            &mut payload,
            applied.iter().map(|f| f.as_str()),
            FieldSource::Llm,
            now,
        );

        match record.card_type {
            CardKind::SelfCard => {
                self.store
                    .update_self_card(card_id, payload, ChangedBy::System)
                    .await?
            }
            CardKind::Character => {
                self.store
                    .update_character_card(card_id, payload, ChangedBy::System)
                    .await?
            }
            CardKind::World => unreachable!("world updates use apply_world_update"),
        }

        Ok(applied)
    }

    /// World events accept only `description` and `key_array`, replace only.
    async fn apply_world_update(
        &self,
        record: &RecordProposal,
        event: Option<&WorldEventCard>,
    ) -> MindloomResult<Vec<String>> {
        let Some(event) = event else {
            return Ok(vec![]);
        };

        let mut description: Option<String> = None;
        let mut keywords: Option<Vec<String>> = None;
        let mut applied = Vec::new();

        for diff in &record.updates {
            if diff.confidence < self.config.field_confidence_threshold {
                continue;
            }
            if diff.action != UpdateAction::Replace {
                continue;
            }
            match diff.field.as_str() {
                "description" => {
                    if let Some(value) = diff.value.as_str() {
                        description = Some(value.to_string());
                        applied.push(diff.field.clone());
                    }
                }
                "key_array" => {
                    if let Ok(value) =
                        serde_json::from_value::<Vec<String>>(diff.value.clone())
                    {
                        keywords = Some(value);
                        applied.push(diff.field.clone());
                    }
                }
                _ => {}
            }
        }

        if applied.is_empty() {
            return Ok(vec![]);
        }

        self.store
            .update_world_event(
                event.id,
                description.as_deref(),
                keywords.as_deref(),
                ChangedBy::System,
            )
            .await?;

        Ok(applied)
    }

    /// Create proposed character cards for people not already on file.
    async fn create_new_cards(
        &self,
        owner_id: i64,
        proposals: &[NewCardProposal],
        existing: &[CharacterCard],
        now: DateTime<Utc>,
    ) -> MindloomResult<usize> {
        let mut created = 0;

        for proposal in proposals {
            if proposal.card_type.as_deref() != Some("character") {
                continue;
            }
            let Some(name) = proposal.name.as_deref().filter(|n| !n.trim().is_empty()) else {
                continue;
            };

            let duplicate = existing
                .iter()
                .any(|c| c.display_name.eq_ignore_ascii_case(name));
            if duplicate {
                continue;
            }

            let category = proposal
                .relationship_type
                .as_deref()
                .and_then(|t| RelationshipCategory::from_str(t).ok())
                .unwrap_or(RelationshipCategory::Other);

            let mut payload = json!({
                "data": {
                    "name": name,
                    "relationship_type": category.to_string(),
                    "personality": proposal.personality.clone().unwrap_or_default(),
                    "traits": proposal.traits.clone(),
                    "patterns": proposal.patterns.clone(),
                }
            });
            metadata::initialize_card(&mut payload, FieldSource::Llm, now);

            self.store
                .create_character_card(owner_id, name, category, None, payload)
                .await?;
            created += 1;
            tracing::info!("Created character card '{}' from session analysis", name);
        }

        Ok(created)
    }

    fn base_metadata(&self, owner_id: i64, session_id: i64, attempts: u32) -> Value {
        json!({
            "session_id": session_id,
            "owner": hash_id(owner_id),
            "model": self.config.llm.model,
            "attempt": attempts,
        })
    }
}
