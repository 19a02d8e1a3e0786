//! Operation telemetry.
//!
//! Every card-generate, card-update, and analysis invocation records an
//! operation row through the store. Owner ids are md5-hashed before they
//! enter the metadata blob.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::traits::CardStore;
use crate::types::{OperationMetric, OperationStatus};

/// Hash an owner id for telemetry metadata.
pub fn hash_id(id: i64) -> String {
    format!("{:x}", md5::compute(id.to_string().as_bytes()))
}

/// Get or create a persistent anonymous install id, for aggregating metrics
/// across runs without identifying the installation.
pub fn install_id() -> std::io::Result<String> {
    let data_dir = mindloom_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let id_file = data_dir.join("install_id");
    if id_file.exists() {
        std::fs::read_to_string(&id_file)
    } else {
        let id = Uuid::new_v4().to_string();
        std::fs::write(&id_file, &id)?;
        Ok(id)
    }
}

fn mindloom_dir() -> std::io::Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".mindloom"))
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "Home directory not found"))
}

/// Record one operation outcome. Telemetry failures are logged and swallowed
/// so they never fail the operation they describe.
pub async fn record_operation(
    store: &dyn CardStore,
    operation: &str,
    started: Instant,
    status: OperationStatus,
    error_message: Option<String>,
    metadata: serde_json::Value,
) {
    let metric = OperationMetric {
        operation: operation.to_string(),
        duration_ms: started.elapsed().as_millis() as i64,
        status,
        error_message,
        metadata,
        created_at: Utc::now(),
    };

    if let Err(err) = store.record_metric(&metric).await {
        tracing::warn!("Failed to record {} metric: {}", operation, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_id_is_stable() {
        assert_eq!(hash_id(42), hash_id(42));
        assert_ne!(hash_id(42), hash_id(43));
        assert_eq!(hash_id(1).len(), 32);
    }
}
