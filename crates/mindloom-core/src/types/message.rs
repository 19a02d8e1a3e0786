//! Message types: chat transcripts (read-only input) and LLM conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
}

/// A message in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Who produced a chat message.
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
pub enum Speaker {
    Client,
    Counselor,
    Guide,
}

/// A chat session. Consumed read-only by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub owner_id: i64,
    pub counselor_id: i64,
    pub created_at: DateTime<Utc>,
}

/// One message in a chat session transcript. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub speaker: Speaker,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Format transcript messages into a prompt block, mapping speakers to the
/// labels analysis prompts use.
pub fn format_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|msg| {
            let speaker = match msg.speaker {
                Speaker::Client => "User",
                Speaker::Counselor => "Advisor",
                Speaker::Guide => "Guide",
            };
            format!("{}: {}", speaker, msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(speaker: Speaker, content: &str) -> ChatMessage {
        ChatMessage {
            id: 0,
            session_id: 1,
            role: match speaker {
                Speaker::Client => "user".to_string(),
                _ => "assistant".to_string(),
            },
            speaker,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_messages_maps_speakers() {
        let transcript = vec![
            msg(Speaker::Client, "I had a rough week"),
            msg(Speaker::Counselor, "Tell me more"),
        ];
        let formatted = format_messages(&transcript);
        assert_eq!(formatted, "User: I had a rough week\nAdvisor: Tell me more");
    }

    #[test]
    fn test_llm_message_constructors() {
        let m = Message::system("be precise");
        assert_eq!(m.role, MessageRole::System);
        assert_eq!(m.content, "be precise");
    }
}
