//! # Fibonacci Backoff
//!
//! Progressive backoff for transient UnifiedPush and Kubernetes failures.
//! Delays follow the Fibonacci sequence scaled by the configured start value
//! and capped at the configured maximum, e.g. with 1s/30s:
//! 1s, 1s, 2s, 3s, 5s, 8s, 13s, 21s, 30s (max).
//!
//! ## Usage
//!
//! ```rust
//! use ups_binding_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1000, 30_000);
//! assert_eq!(backoff.next_backoff_ms(), 1000);
//! assert_eq!(backoff.next_backoff_ms(), 1000);
//! assert_eq!(backoff.next_backoff_ms(), 2000);
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::BindingError;
use crate::observability::metrics;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `min_ms`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_ms: u64,
    prev_ms: u64,
    current_ms: u64,
    max_ms: u64,
}

impl FibonacciBackoff {
    /// Create a new backoff with minimum and maximum delays in milliseconds
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            prev_ms: 0,
            current_ms: min_ms.min(max_ms),
            max_ms,
        }
    }

    /// Get the next delay in milliseconds and advance the sequence
    pub fn next_backoff_ms(&mut self) -> u64 {
        let result = self.current_ms;
        let next = self.prev_ms.saturating_add(self.current_ms);
        self.prev_ms = self.current_ms;
        self.current_ms = next.min(self.max_ms);
        result
    }

    /// Get the next delay as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_millis(self.next_backoff_ms())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_ms = 0;
        self.current_ms = self.min_ms.min(self.max_ms);
    }
}

/// How transient failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first call
    pub max_attempts: u32,
    pub backoff_start_ms: u64,
    pub backoff_max_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_start_ms: u64, backoff_max_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_start_ms,
            backoff_max_ms,
        }
    }

    /// A policy that never retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, 0, 0)
    }

    fn backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(self.backoff_start_ms, self.backoff_max_ms)
    }
}

impl From<&crate::config::ControllerConfig> for RetryPolicy {
    fn from(config: &crate::config::ControllerConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            config.backoff_start_ms,
            config.backoff_max_ms,
        )
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. The last error is returned.
pub async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, BindingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BindingError>>,
{
    let mut backoff = policy.backoff();
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = backoff.next_backoff();
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient failure, retrying"
                );
                metrics::increment_retries(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
