//! LLM-based plain text to structured card conversion.
//!
//! Supports the three card kinds, retries through the shared policy, and
//! degrades to a minimal plain-text card when the model never produces
//! parseable JSON.

mod prompts;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::CoreConfig;
use crate::error::{MindloomError, MindloomResult};
use crate::json_repair::parse_lenient;
use crate::metadata::{self, FieldSource};
use crate::retry::with_retry;
use crate::telemetry::record_operation;
use crate::traits::{CardGenerator, CardStore, GeneratedCard, GenerationOptions, Llm};
use crate::types::{CardKind, Message, OperationStatus};

const OPERATION: &str = "card_generate";

/// Card generator backed by an LLM.
pub struct LlmCardGenerator {
    llm: Arc<dyn Llm>,
    store: Arc<dyn CardStore>,
    config: CoreConfig,
}

impl LlmCardGenerator {
    pub fn new(llm: Arc<dyn Llm>, store: Arc<dyn CardStore>, config: CoreConfig) -> Self {
        Self { llm, store, config }
    }

    fn parse_card(&self, response: &str, kind: CardKind) -> MindloomResult<Value> {
        let mut parsed: Value = parse_lenient(response)
            .ok_or_else(|| MindloomError::parse("Card generation response was not valid JSON"))?;
        if !parsed.is_object() {
            return Err(MindloomError::parse("Card generation response was not an object"));
        }

        if kind == CardKind::World {
            parsed["spec"] = json!("mindloom_world_event_v1");
            parsed["spec_version"] = json!("1.0");
        }
        Ok(parsed)
    }
}

#[async_trait]
impl CardGenerator for LlmCardGenerator {
    async fn generate(
        &self,
        kind: CardKind,
        plain_text: &str,
        context: Option<&str>,
        name: Option<&str>,
    ) -> MindloomResult<GeneratedCard> {
        let started = Instant::now();
        let prompt = prompts::build_prompt(kind, plain_text, context, name);
        let attempts = AtomicU32::new(0);

        let result = with_retry(&self.config.retry, OPERATION, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            let response = self
                .llm
                .generate(
                    &[Message::system(prompt.clone())],
                    Some(GenerationOptions::new(self.config.llm.temperature, 4000)),
                )
                .await?;
            self.parse_card(response.content_or_empty(), kind)
        })
        .await;

        let metadata = json!({
            "model": self.config.llm.model,
            "attempt": attempts.load(Ordering::SeqCst),
            "card_type": kind.to_string(),
        });

        match result {
            Ok(mut card) => {
                metadata::initialize_card(&mut card, FieldSource::Llm, Utc::now());
                record_operation(
                    self.store.as_ref(),
                    OPERATION,
                    started,
                    OperationStatus::Success,
                    None,
                    metadata,
                )
                .await;
                Ok(GeneratedCard {
                    kind,
                    card,
                    fallback: false,
                })
            }
            Err(err @ MindloomError::Parse { .. }) => {
                record_operation(
                    self.store.as_ref(),
                    OPERATION,
                    started,
                    OperationStatus::Fallback,
                    Some(err.to_string()),
                    metadata,
                )
                .await;
                Ok(GeneratedCard {
                    kind,
                    card: json!({
                        "plain_text": plain_text,
                        "fallback": true,
                        "name": name.unwrap_or("Untitled"),
                    }),
                    fallback: true,
                })
            }
            Err(err) => {
                record_operation(
                    self.store.as_ref(),
                    OPERATION,
                    started,
                    OperationStatus::Error,
                    Some(err.to_string()),
                    metadata,
                )
                .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::traits::{LlmResponse, LlmStream};
    use crate::types::MessageRole;

    struct ScriptedLlm {
        responses: std::sync::Mutex<Vec<MindloomResult<String>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<MindloomResult<String>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn generate(
            &self,
            messages: &[Message],
            _: Option<GenerationOptions>,
        ) -> MindloomResult<LlmResponse> {
            assert_eq!(messages[0].role, MessageRole::System);
            let mut responses = self.responses.lock().unwrap();
            let next = responses.remove(0);
            next.map(|content| LlmResponse {
                content: Some(content),
                usage: None,
            })
        }

        async fn generate_stream(
            &self,
            _: &[Message],
            _: Option<GenerationOptions>,
        ) -> MindloomResult<LlmStream> {
            Err(MindloomError::llm("streaming not supported in tests"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.retry.max_retries = 2;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config
    }

    #[tokio::test]
    async fn test_generate_self_card_with_metadata() {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"{
            "spec": "mindloom_self_card_v1",
            "spec_version": "1.0",
            "data": {"personality": "Curious", "traits": ["kind"]}
        }"#
            .to_string())]));
        let generator = LlmCardGenerator::new(llm, store.clone(), fast_config());

        let generated = generator
            .generate(CardKind::SelfCard, "I am a curious person", None, None)
            .await
            .unwrap();

        assert!(!generated.fallback);
        assert_eq!(generated.card["data"]["personality"], "Curious");
        assert!(generated.card["_metadata"]["personality"].is_object());

        let metrics = store.metrics_for(OPERATION).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].status, OperationStatus::Success);
    }

    #[tokio::test]
    async fn test_generate_retries_parse_failures() {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("that is a lovely person".to_string()),
            Ok(r#"{"data": {"name": "Avery"}}"#.to_string()),
        ]));
        let generator = LlmCardGenerator::new(llm, store, fast_config());

        let generated = generator
            .generate(CardKind::Character, "my friend Avery", None, Some("Avery"))
            .await
            .unwrap();
        assert!(!generated.fallback);
        assert_eq!(generated.card["data"]["name"], "Avery");
    }

    #[tokio::test]
    async fn test_generate_falls_back_after_exhaustion() {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("nope".to_string()),
            Ok("still nope".to_string()),
            Ok("never json".to_string()),
        ]));
        let generator = LlmCardGenerator::new(llm, store.clone(), fast_config());

        let generated = generator
            .generate(CardKind::Character, "my friend Avery", None, Some("Avery"))
            .await
            .unwrap();

        assert!(generated.fallback);
        assert_eq!(generated.card["name"], "Avery");
        assert_eq!(generated.card["fallback"], true);

        let metrics = store.metrics_for(OPERATION).unwrap();
        assert_eq!(metrics[0].status, OperationStatus::Fallback);
    }

    #[tokio::test]
    async fn test_generate_propagates_transport_errors() {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(MindloomError::llm("down")),
            Err(MindloomError::llm("down")),
            Err(MindloomError::llm("down")),
        ]));
        let generator = LlmCardGenerator::new(llm, store.clone(), fast_config());

        let result = generator
            .generate(CardKind::SelfCard, "text", None, None)
            .await;
        assert!(result.is_err());

        let metrics = store.metrics_for(OPERATION).unwrap();
        assert_eq!(metrics[0].status, OperationStatus::Error);
    }

    #[tokio::test]
    async fn test_world_card_gets_spec_fields() {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"{
            "title": "Promotion",
            "event_type": "achievement",
            "key_array": ["promotion", "work"],
            "description": "[Event: achievement]",
            "resolved": true
        }"#
            .to_string())]));
        let generator = LlmCardGenerator::new(llm, store, fast_config());

        let generated = generator
            .generate(CardKind::World, "I got promoted", None, None)
            .await
            .unwrap();
        assert_eq!(generated.card["spec"], "mindloom_world_event_v1");
        assert_eq!(generated.card["title"], "Promotion");
    }
}
