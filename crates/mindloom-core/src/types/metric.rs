//! Operation telemetry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a core operation, as recorded in telemetry.
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
#[strum(serialize_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Skipped,
    Fallback,
    Error,
}

/// One telemetry row for a card-generate, card-update, or analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetric {
    pub operation: String,
    pub duration_ms: i64,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    /// Model used, attempt count, hashed ids, counts.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(OperationStatus::Success.to_string(), "success");
        assert_eq!(OperationStatus::Fallback.to_string(), "fallback");
    }
}
