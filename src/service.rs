//! Shared failure model for calls to external services
//!
//! Embedding, generation and rerank calls are all fallible and bounded:
//! every attempt runs under a timeout and a failed attempt is retried a
//! fixed number of times before the error is surfaced.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Response(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: Box<ServiceError>,
    },
}

/// Timeout and retry bounds for one kind of service call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff: Duration::from_millis(250),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 1)
    }
}

/// Run `call` under the policy's timeout, retrying on any failure
///
/// Dropping the returned future abandons the call; nothing is persisted by
/// this layer, so cancellation at this point is always safe.
pub async fn call_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let attempts = policy.max_retries + 1;
    let mut last = ServiceError::Unavailable(format!("{} was never attempted", operation));

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                operation: operation.to_string(),
                timeout_ms: policy.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                warn!("{} attempt {}/{} failed: {}", operation, attempt, attempts, e);
                last = e;
                if attempt < attempts && !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    Err(ServiceError::Exhausted {
        operation: operation.to_string(),
        attempts,
        last: Box::new(last),
    })
}

/// A stage that was skipped or fell back during one exchange
///
/// Degraded capabilities never fail the exchange; they are reported next to
/// the answer so misconfiguration stays visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Degradation {
    /// Semantic retrieval failed; results are lexical only
    SemanticUnavailable(String),
    /// No rerank service is configured
    RerankSkipped,
    RerankFailed(String),
    /// Condensation failed; the sanitized question was used as-is
    CondenseFailed(String),
    EvaluationDisabled,
    EvaluationFailed(String),
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::SemanticUnavailable(reason) => {
                write!(f, "semantic retrieval unavailable ({}); lexical results only", reason)
            }
            Degradation::RerankSkipped => write!(f, "rerank not configured; fused order kept"),
            Degradation::RerankFailed(reason) => {
                write!(f, "rerank failed ({}); fused order kept", reason)
            }
            Degradation::CondenseFailed(reason) => {
                write!(f, "condensation failed ({}); question used verbatim", reason)
            }
            Degradation::EvaluationDisabled => write!(f, "evaluation disabled"),
            Degradation::EvaluationFailed(reason) => write!(f, "evaluation failed ({})", reason),
        }
    }
}
