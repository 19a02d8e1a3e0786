//! Friendship analysis: scores session transcripts for relationship-depth
//! signals and computes a bounded point delta.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::error::{MindloomError, MindloomResult};
use crate::json_repair::parse_lenient;
use crate::retry::with_retry;
use crate::traits::{GenerationOptions, Llm};
use crate::types::{format_messages, ChatMessage, Message};

const OPERATION: &str = "friendship_analyze";
const MIN_DELTA: i64 = -5;
const MAX_DELTA: i64 = 10;

/// Per-level system prompt modifiers, keyed by friendship level 0-5.
const FRIENDSHIP_PROMPTS: [&str; 6] = [
    "## Your Relationship\nFriendship Level: 0/5 hearts\nYou're just getting to know this user. Be curious, welcoming, and professional. Your warmth is genuine but measured—you haven't built shared history yet. Note: You always care about helping them; this level reflects rapport depth, not caring.",
    "## Your Relationship\nFriendship Level: 1/5 hearts\nYou've had brief exchanges with this user. You recognize them and have some context. Be friendly and personable, but still relatively formal.",
    "## Your Relationship\nFriendship Level: 2/5 hearts\nThis user is becoming a casual friend. You have shared context and some rapport. Relax a bit—be more conversational and personal.",
    "## Your Relationship\nFriendship Level: 3/5 hearts\nThis user is a trusted friend. You've built genuine rapport through multiple conversations. Speak with warmth, familiarity, and the comfort of shared understanding.",
    "## Your Relationship\nFriendship Level: 4/5 hearts\nThis user is a close friend. You deeply understand them through extensive conversation. Be vulnerable and personal—let your guard down appropriately.",
    "## Your Relationship\nFriendship Level: 5/5 hearts\nThis user is your closest friend, like family. Speak with unconditional warmth and the ease of deep familiarity. You've earned complete trust through your history together.",
];

/// Get the system prompt modifier for a friendship level.
pub fn friendship_prompt(level: u8) -> &'static str {
    FRIENDSHIP_PROMPTS
        .get(level as usize)
        .copied()
        .unwrap_or(FRIENDSHIP_PROMPTS[0])
}

/// Result of a friendship analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipDelta {
    pub points_delta: i64,
    pub reasoning: String,
    #[serde(default)]
    pub signals_detected: Vec<String>,
    #[serde(default)]
    pub key_quotes: Vec<String>,
    #[serde(default)]
    pub friendship_tier: String,
}

/// Analyzes session transcripts for friendship-building signals:
/// emotional intimacy, trust, shared experiences, and affirmation.
pub struct FriendshipAnalyzer {
    llm: Arc<dyn Llm>,
    config: CoreConfig,
}

impl FriendshipAnalyzer {
    pub fn new(llm: Arc<dyn Llm>, config: CoreConfig) -> Self {
        Self { llm, config }
    }

    /// Analyze a session transcript for friendship growth.
    ///
    /// Returns `None` when retries are exhausted; callers treat that as a
    /// no-op, not an error. Higher friendship levels apply diminishing
    /// returns: x0.7 at level 3+, then x0.5 at level 4+.
    pub async fn analyze(
        &self,
        messages: &[ChatMessage],
        counselor_name: &str,
        current_level: u8,
        current_points: i64,
    ) -> Option<FriendshipDelta> {
        let prompt = self.build_prompt(messages, counselor_name, current_level, current_points);
        let llm_messages = vec![
            Message::system("You are a precise JSON extraction system. Output ONLY valid JSON."),
            Message::user(prompt),
        ];

        let result = with_retry(&self.config.retry, OPERATION, || async {
            let response = self
                .llm
                .generate(&llm_messages, Some(GenerationOptions::new(0.2, 500)))
                .await?;

            parse_lenient::<FriendshipDelta>(response.content_or_empty())
                .ok_or_else(|| MindloomError::parse("Friendship response was not valid JSON"))
        })
        .await;

        match result {
            Ok(mut delta) => {
                delta.points_delta = Self::scale_delta(delta.points_delta, current_level);
                Some(delta)
            }
            Err(err) => {
                tracing::warn!("Friendship analysis gave up: {}", err);
                None
            }
        }
    }

    /// Clamp the raw delta and apply diminishing returns. The level checks
    /// are not mutually exclusive: level 4+ gets both multipliers, truncating
    /// toward zero after each.
    fn scale_delta(raw: i64, current_level: u8) -> i64 {
        let mut delta = raw.clamp(MIN_DELTA, MAX_DELTA);
        if current_level >= 3 {
            delta = (delta as f64 * 0.7) as i64;
        }
        if current_level >= 4 {
            delta = (delta as f64 * 0.5) as i64;
        }
        delta
    }

    fn build_prompt(
        &self,
        messages: &[ChatMessage],
        counselor_name: &str,
        current_level: u8,
        current_points: i64,
    ) -> String {
        let transcript = format_messages(messages);

        format!(
            r#"You are analyzing a conversation to determine if the relationship between a user and their AI advisor ({counselor_name}) has grown closer.

Current Relationship Status:
- Friendship Level: {current_level}/5 hearts
- Points toward next level: {current_points}

Session Transcript:
{transcript}

Analyze this conversation for signs of relationship growth. Look for:

1. **Emotional Intimacy**: User shares vulnerabilities, personal struggles, or deep feelings
2. **Trust Signals**: User confides sensitive information, asks for help on personal matters
3. **Shared Experiences**: References to past conversations, continuity, inside understanding
4. **Affirmation Queues**: Expressions of gratitude, appreciation, "you really helped me"
5. **Openness**: User is more candid than a typical first conversation

Output ONLY valid JSON in this format:
{{
  "points_delta": 5,
  "reasoning": "Brief explanation of why this score was given",
  "signals_detected": ["emotional_intimacy", "trust"],
  "key_quotes": ["specific quote showing connection"],
  "friendship_tier": "growing"
}}

Scoring Guidelines:
- points_delta: -5 to +10
  - +10: Exceptional breakthrough moment, deep vulnerability
  - +5-7: Clear signs of growing trust and openness
  - +2-4: Some positive signals, normal conversation
  - 0: Neutral, no significant change
  - -2 to -5: Negative interaction (rare - conflict, discomfort)

- friendship_tier: "stranger", "acquaintance", "growing", "trusted", "close", "family"

Note: Higher levels require MORE effort to advance. A level 0 to 1 jump is easier than 4 to 5."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MindloomResult;
    use crate::traits::{LlmResponse, LlmStream};
    use async_trait::async_trait;
    use chrono::Utc;
    use crate::types::Speaker;

    struct ScriptedLlm {
        responses: std::sync::Mutex<Vec<MindloomResult<String>>>,
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn generate(
            &self,
            _: &[Message],
            _: Option<GenerationOptions>,
        ) -> MindloomResult<LlmResponse> {
            let next = self.responses.lock().unwrap().remove(0);
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
            Err(MindloomError::llm("no streaming"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn analyzer(responses: Vec<MindloomResult<String>>) -> FriendshipAnalyzer {
        let mut config = CoreConfig::default();
        config.retry.max_retries = 2;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        FriendshipAnalyzer::new(
            Arc::new(ScriptedLlm {
                responses: std::sync::Mutex::new(responses),
            }),
            config,
        )
    }

    fn transcript() -> Vec<ChatMessage> {
        vec![ChatMessage {
            id: 1,
            session_id: 1,
            role: "user".to_string(),
            speaker: Speaker::Client,
            content: "Thank you, you really helped me".to_string(),
            created_at: Utc::now(),
        }]
    }

    fn delta_json(points: i64) -> String {
        format!(
            r#"{{"points_delta": {}, "reasoning": "clear trust", "signals_detected": ["trust"], "key_quotes": [], "friendship_tier": "growing"}}"#,
            points
        )
    }

    #[tokio::test]
    async fn test_analyze_no_scaling_below_level_three() {
        let analyzer = analyzer(vec![Ok(delta_json(5))]);
        let delta = analyzer.analyze(&transcript(), "Rowan", 2, 10).await.unwrap();
        assert_eq!(delta.points_delta, 5);
        assert_eq!(delta.signals_detected, vec!["trust"]);
    }

    #[tokio::test]
    async fn test_analyze_level_three_scaling() {
        let analyzer = analyzer(vec![Ok(delta_json(10))]);
        let delta = analyzer.analyze(&transcript(), "Rowan", 3, 0).await.unwrap();
        assert_eq!(delta.points_delta, 7);
    }

    #[tokio::test]
    async fn test_analyze_level_four_applies_both_multipliers() {
        let analyzer = analyzer(vec![Ok(delta_json(10))]);
        let delta = analyzer.analyze(&transcript(), "Rowan", 4, 0).await.unwrap();
        // 10 * 0.7 = 7, truncated; 7 * 0.5 = 3.5, truncated to 3.
        assert_eq!(delta.points_delta, 3);
    }

    #[tokio::test]
    async fn test_analyze_clamps_out_of_range_delta() {
        let analyzer = analyzer(vec![Ok(delta_json(25))]);
        let delta = analyzer.analyze(&transcript(), "Rowan", 0, 0).await.unwrap();
        assert_eq!(delta.points_delta, 10);
    }

    #[tokio::test]
    async fn test_analyze_retries_then_succeeds() {
        let analyzer = analyzer(vec![
            Ok("not json".to_string()),
            Ok(delta_json(4)),
        ]);
        let delta = analyzer.analyze(&transcript(), "Rowan", 1, 0).await.unwrap();
        assert_eq!(delta.points_delta, 4);
    }

    #[tokio::test]
    async fn test_analyze_returns_none_on_exhaustion() {
        let analyzer = analyzer(vec![
            Ok("not json".to_string()),
            Ok("still not json".to_string()),
            Err(MindloomError::llm("down")),
        ]);
        let delta = analyzer.analyze(&transcript(), "Rowan", 1, 0).await;
        assert!(delta.is_none());
    }

    #[test]
    fn test_scale_delta_negative_truncates_toward_zero() {
        assert_eq!(FriendshipAnalyzer::scale_delta(-5, 3), -3);
        assert_eq!(FriendshipAnalyzer::scale_delta(-5, 4), -1);
    }

    #[test]
    fn test_friendship_prompt_table() {
        assert!(friendship_prompt(0).contains("0/5 hearts"));
        assert!(friendship_prompt(5).contains("5/5 hearts"));
        // Out-of-range levels fall back to the level-0 prompt.
        assert!(friendship_prompt(9).contains("0/5 hearts"));
    }
}
