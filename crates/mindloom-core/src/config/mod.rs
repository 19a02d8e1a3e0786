//! Configuration system for mindloom.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MindloomError, MindloomResult};
use crate::retry::RetryPolicy;
use crate::traits::LlmConfig;

/// Bounds for `recent_card_session_limit`.
const RECENT_LIMIT_MIN: usize = 1;
const RECENT_LIMIT_MAX: usize = 20;
const RECENT_LIMIT_DEFAULT: usize = 5;

/// Deployment environment. Controls how configuration errors are handled.
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
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

/// Main configuration for the memory core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Path to the card database.
    pub database_path: PathBuf,
    /// LLM configuration.
    pub llm: LlmConfig,
    /// Batch-level confidence gate for card updates.
    pub batch_confidence_threshold: f64,
    /// Per-field confidence gate for card updates.
    pub field_confidence_threshold: f64,
    /// Look back N distinct prior sessions when loading recent cards.
    /// Valid range is [1, 20].
    pub recent_card_session_limit: usize,
    /// Retry policy applied to all LLM-backed operations.
    pub retry: RetryPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".mindloom"))
            .unwrap_or_else(|| PathBuf::from(".mindloom"));

        Self {
            environment: Environment::Development,
            database_path: data_dir.join("mindloom.db"),
            llm: LlmConfig::default(),
            batch_confidence_threshold: 0.3,
            field_confidence_threshold: 0.7,
            recent_card_session_limit: RECENT_LIMIT_DEFAULT,
            retry: RetryPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> MindloomResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| MindloomError::Configuration(e.to_string()))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| MindloomError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| MindloomError::Configuration(e.to_string()))?,
            _ => {
                return Err(MindloomError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validated()
    }

    /// Load configuration from environment variables (reads `.env` if present).
    pub fn from_env() -> MindloomResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(env) = std::env::var("MINDLOOM_ENV") {
            config.environment = env
                .parse()
                .map_err(|_| MindloomError::Configuration(format!("Unknown environment: {}", env)))?;
        }
        if let Ok(path) = std::env::var("MINDLOOM_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(model) = std::env::var("MINDLOOM_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
            config.llm.api_key = Some(api_key);
        }
        if let Ok(limit) = std::env::var("RECENT_CARD_SESSION_LIMIT") {
            config.recent_card_session_limit = limit.parse().map_err(|_| {
                MindloomError::Configuration(format!(
                    "RECENT_CARD_SESSION_LIMIT must be an integer, got '{}'",
                    limit
                ))
            })?;
        }

        config.validated()
    }

    /// Validate the configuration.
    ///
    /// An out-of-range `recent_card_session_limit` is an error in
    /// development and testing, and falls back to the default with a logged
    /// warning in production.
    pub fn validated(mut self) -> MindloomResult<Self> {
        if !(RECENT_LIMIT_MIN..=RECENT_LIMIT_MAX).contains(&self.recent_card_session_limit) {
            let message = format!(
                "recent_card_session_limit must be between {} and {}, got {}",
                RECENT_LIMIT_MIN, RECENT_LIMIT_MAX, self.recent_card_session_limit
            );

            match self.environment {
                Environment::Development | Environment::Testing => {
                    return Err(MindloomError::Configuration(message));
                }
                Environment::Production => {
                    tracing::warn!(
                        "{}. Falling back to default ({}).",
                        message,
                        RECENT_LIMIT_DEFAULT
                    );
                    self.recent_card_session_limit = RECENT_LIMIT_DEFAULT;
                }
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = CoreConfig::default();
        assert_eq!(config.batch_confidence_threshold, 0.3);
        assert_eq!(config.field_confidence_threshold, 0.7);
        assert_eq!(config.recent_card_session_limit, 5);
    }

    #[test]
    fn test_recent_limit_rejected_in_development() {
        let config = CoreConfig {
            recent_card_session_limit: 0,
            ..Default::default()
        };
        assert!(config.validated().is_err());

        let config = CoreConfig {
            recent_card_session_limit: 21,
            environment: Environment::Testing,
            ..Default::default()
        };
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_recent_limit_falls_back_in_production() {
        let config = CoreConfig {
            recent_card_session_limit: 99,
            environment: Environment::Production,
            ..Default::default()
        };
        let config = config.validated().unwrap();
        assert_eq!(config.recent_card_session_limit, 5);
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mindloom.toml");
        std::fs::write(
            &path,
            r#"
environment = "production"
recent_card_session_limit = 7

[llm]
model = "anthropic/claude-3-haiku"
max_tokens = 1500
"#,
        )
        .unwrap();

        let config = CoreConfig::from_file(&path).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.recent_card_session_limit, 7);
        assert_eq!(config.llm.max_tokens, 1500);
        // Unspecified fields keep defaults.
        assert_eq!(config.field_confidence_threshold, 0.7);
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mindloom.ini");
        std::fs::write(&path, "x = 1").unwrap();
        assert!(CoreConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_recent_limit_bounds_are_inclusive() {
        for limit in [1, 20] {
            let config = CoreConfig {
                recent_card_session_limit: limit,
                ..Default::default()
            };
            assert!(config.validated().is_ok());
        }
    }
}
