//! Shared retry policy for LLM-backed operations.
//!
//! Every component that talks to an LLM retries through this one utility,
//! with its own `RetryPolicy`, instead of hand-rolling loops.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::error::MindloomResult;

/// Retry configuration supplied per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,
    /// Initial delay before first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds).
    pub max_delay_ms: u64,
    /// Backoff multiplier.
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.max_retries as usize)
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(self.multiplier)
    }
}

/// Run an async operation under the given retry policy.
///
/// Only retryable errors (LLM transport, parse, network) are retried;
/// validation and persistence failures surface immediately. The operation
/// name is only used for log lines.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    f: F,
) -> MindloomResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MindloomResult<T>>,
{
    f.retry(policy.builder())
        .when(|err| err.is_retryable())
        .notify(|err, dur| {
            tracing::warn!("{} failed, retrying in {:?}: {}", operation, dur, err);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MindloomError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 1.0,
        };

        let result = with_retry(&policy, "test_op", || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(MindloomError::llm("transient"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_surfaces_immediately() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 1.0,
        };

        let result: MindloomResult<()> = with_retry(&policy, "test_op", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(MindloomError::validation("bad input"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_last_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 1.0,
        };

        let result: MindloomResult<()> = with_retry(&policy, "test_op", || async {
            Err(MindloomError::llm("always down"))
        })
        .await;

        assert!(result.is_err());
    }
}
