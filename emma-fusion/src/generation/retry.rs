//! Bounded retry with exponential backoff for generation calls
//!
//! **Algorithm:**
//! 1. Attempt the call
//! 2. On success, return it
//! 3. On a transient error with attempts left: log WARN, back off, retry
//! 4. On a permanent error, or when attempts run out: return the last error
//!
//! **Backoff:** starts at `initial_backoff`, doubles each retry, capped at
//! `max_backoff`.

use crate::error::GenerationError;
use std::future::Future;
use std::time::Duration;

/// Retry limits for one upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1)
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Final result of a retried operation plus the attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, GenerationError>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying generation call");
        }

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Generation call succeeded after retry"
                    );
                }
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(err) if !err.is_transient() => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Generation call failed permanently"
                );
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                };
            }
            Err(err) if attempt >= max_attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Generation call failed: retries exhausted"
                );
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                };
            }
            Err(err) => {
                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient generation error, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
