//! Clinical insight extraction from session transcripts.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::error::{MindloomError, MindloomResult};
use crate::json_repair::parse_lenient;
use crate::retry::with_retry;
use crate::traits::{GenerationOptions, Llm};
use crate::types::{format_messages, ChatMessage, Message};

const OPERATION: &str = "insight_extract";

/// Findings for one analyzed dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionInsight {
    /// 0-100, or null when the session had no relevant data.
    pub score: Option<f64>,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// Risk assessment block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Structured insights for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInsights {
    #[serde(default)]
    pub dimensions: BTreeMap<String, DimensionInsight>,
    #[serde(default)]
    pub session_summary: String,
    #[serde(default)]
    pub detected_concerns: Vec<String>,
    #[serde(default)]
    pub suggested_focus_areas: Vec<String>,
    #[serde(default)]
    pub risk_assessment: RiskAssessment,
}

/// Extracts clinical insights from counseling sessions using an LLM.
pub struct InsightExtractor {
    llm: Arc<dyn Llm>,
    config: CoreConfig,
}

impl InsightExtractor {
    pub fn new(llm: Arc<dyn Llm>, config: CoreConfig) -> Self {
        Self { llm, config }
    }

    /// Extract insights for the given dimensions. Returns `None` when
    /// retries are exhausted; callers treat that as a no-op.
    pub async fn extract(
        &self,
        messages: &[ChatMessage],
        client_profile: &serde_json::Value,
        dimensions: &[String],
        session_number: u32,
        duration_minutes: u32,
    ) -> Option<SessionInsights> {
        let prompt = self.build_prompt(
            messages,
            client_profile,
            dimensions,
            session_number,
            duration_minutes,
        );
        let llm_messages = vec![
            Message::system("You are a precise JSON extraction system. Output ONLY valid JSON."),
            Message::user(prompt),
        ];

        let result = with_retry(&self.config.retry, OPERATION, || async {
            let response = self
                .llm
                .generate(&llm_messages, Some(GenerationOptions::new(0.1, 1000)))
                .await?;

            parse_lenient::<SessionInsights>(response.content_or_empty())
                .ok_or_else(|| MindloomError::parse("Insight response was not valid JSON"))
        })
        .await;

        match result {
            Ok(insights) => Some(insights),
            Err(err) => {
                tracing::warn!("Insight extraction gave up: {}", err);
                None
            }
        }
    }

    fn build_prompt(
        &self,
        messages: &[ChatMessage],
        client_profile: &serde_json::Value,
        dimensions: &[String],
        session_number: u32,
        duration_minutes: u32,
    ) -> String {
        let dimensions_str = dimensions
            .iter()
            .map(|d| format!("\"{}\"", d))
            .collect::<Vec<_>>()
            .join(", ");
        let profile =
            serde_json::to_string_pretty(client_profile).unwrap_or_else(|_| "{}".to_string());

        format!(
            r#"You are a clinical insight extraction system for a therapeutic storytelling app.

Client Profile:
{profile}

Session Context:
- Session Number: {session_number}
- Duration: {duration_minutes} minutes

Session Transcript (last 20 messages):
{transcript}

Extract insights for these dimensions: [{dimensions_str}]

For each dimension, provide:
1. "score": 0-100 (higher = better for engagement/insight/functioning, lower = better for crisis)
2. "indicators": Array of specific quotes or observations (2-4 items)
3. "notes": Brief summary of findings (2-3 sentences)

If no relevant data for a dimension, set "score": null

Output ONLY valid JSON in this format:
{{
  "dimensions": {{
    "engagement": {{
      "score": 75,
      "indicators": ["client shared personal story", "asked follow-up questions"],
      "notes": "Client showed good engagement by sharing openly and showing interest"
    }}
  }},
  "session_summary": "Brief 2-3 sentence summary of session",
  "detected_concerns": ["workplace stress", "perfectionism"],
  "suggested_focus_areas": ["assertive communication", "self-compassion"],
  "risk_assessment": {{
    "level": "none",
    "concerns": []
  }}
}}

Do not include any text outside the JSON."#,
            transcript = format_messages(messages),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn extractor(responses: Vec<MindloomResult<String>>) -> InsightExtractor {
        let mut config = CoreConfig::default();
        config.retry.max_retries = 1;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        InsightExtractor::new(
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
            content: "Work has been overwhelming".to_string(),
            created_at: Utc::now(),
        }]
    }

    #[tokio::test]
    async fn test_extract_parses_dimensions() {
        let extractor = extractor(vec![Ok(r#"{
            "dimensions": {
                "engagement": {"score": 75, "indicators": ["shared openly"], "notes": "Good engagement"},
                "mood": {"score": null, "indicators": [], "notes": ""}
            },
            "session_summary": "Client discussed workplace stress",
            "detected_concerns": ["workplace stress"],
            "suggested_focus_areas": ["boundaries"],
            "risk_assessment": {"level": "none", "concerns": []}
        }"#
        .to_string())]);

        let insights = extractor
            .extract(
                &transcript(),
                &serde_json::json!({"data": {}}),
                &["engagement".to_string(), "mood".to_string()],
                3,
                45,
            )
            .await
            .unwrap();

        assert_eq!(insights.dimensions["engagement"].score, Some(75.0));
        assert_eq!(insights.dimensions["mood"].score, None);
        assert_eq!(insights.detected_concerns, vec!["workplace stress"]);
        assert_eq!(insights.risk_assessment.level, "none");
    }

    #[tokio::test]
    async fn test_extract_returns_none_on_exhaustion() {
        let extractor = extractor(vec![
            Ok("not json".to_string()),
            Ok("still broken".to_string()),
        ]);
        let insights = extractor
            .extract(&transcript(), &serde_json::json!({}), &[], 1, 10)
            .await;
        assert!(insights.is_none());
    }
}
