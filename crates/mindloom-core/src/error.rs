//! Error taxonomy for the memory core.
//!
//! Every error carries a stable [`ErrorCode`] so the chat layer can decide
//! what to show the user without string-matching messages. Confidence-gate
//! rejections are deliberately not errors; they are normal outcomes counted
//! in telemetry.

use thiserror::Error;

/// Result type alias for mindloom operations.
pub type MindloomResult<T> = Result<T, MindloomError>;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all mindloom operations.
#[derive(Error, Debug)]
pub enum MindloomError {
    /// The caller passed something this core cannot act on.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        suggestion: Option<String>,
    },

    /// A card id did not resolve for the requested owner.
    #[error("Card not found: card id '{card_id}'")]
    NotFound { card_id: i64 },

    /// The model call itself failed (transport, provider, empty choice set).
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// The model answered but the answer could not be repaired into the
    /// shape a component expects.
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Source>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    CardNotFound,
    LlmGenerationFailed,
    LlmInvalidResponse,
    DbOperationFailed,
    NetConnectionFailed,
    ConfigurationInvalid,
    IoFailed,
    SerializationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "VAL_001",
            ErrorCode::CardNotFound => "CARD_001",
            ErrorCode::LlmGenerationFailed => "LLM_001",
            ErrorCode::LlmInvalidResponse => "LLM_002",
            ErrorCode::DbOperationFailed => "DB_001",
            ErrorCode::NetConnectionFailed => "NET_001",
            ErrorCode::ConfigurationInvalid => "CFG_001",
            ErrorCode::IoFailed => "IO_001",
            ErrorCode::SerializationFailed => "SER_001",
        }
    }
}

impl MindloomError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn not_found(card_id: i64) -> Self {
        Self::NotFound { card_id }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            source: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::InvalidInput,
            Self::NotFound { .. } => ErrorCode::CardNotFound,
            Self::Llm { .. } => ErrorCode::LlmGenerationFailed,
            Self::Parse { .. } => ErrorCode::LlmInvalidResponse,
            Self::Database { .. } => ErrorCode::DbOperationFailed,
            Self::Network { .. } => ErrorCode::NetConnectionFailed,
            Self::Configuration(_) => ErrorCode::ConfigurationInvalid,
            Self::Io(_) => ErrorCode::IoFailed,
            Self::Serialization(_) => ErrorCode::SerializationFailed,
        }
    }

    /// Whether retrying the same call can plausibly succeed. Validation and
    /// persistence failures are not retried (spec: the core never retries
    /// persistence).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Llm { .. } | Self::Parse { .. } | Self::Network { .. }
        )
    }

    /// A resolution hint for the operator, where one exists.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("Check the card id and owner"),
            Self::Llm { .. } => Some("Check the LLM provider configuration and API key"),
            Self::Database { .. } => Some("Check the database path and permissions"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for MindloomError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_follows_variant() {
        assert_eq!(
            MindloomError::validation("bad input").code(),
            ErrorCode::InvalidInput
        );
        assert_eq!(MindloomError::not_found(42).code(), ErrorCode::CardNotFound);
        assert_eq!(ErrorCode::CardNotFound.as_str(), "CARD_001");
    }

    #[test]
    fn test_not_found_carries_id_and_hint() {
        let err = MindloomError::not_found(42);
        assert!(err.to_string().contains("42"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(MindloomError::llm("down").is_retryable());
        assert!(MindloomError::parse("bad json").is_retryable());
        assert!(!MindloomError::validation("nope").is_retryable());
        assert!(!MindloomError::database("locked").is_retryable());
    }

    #[test]
    fn test_sqlite_errors_map_to_database() {
        let err: MindloomError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.code(), ErrorCode::DbOperationFailed);
    }
}
