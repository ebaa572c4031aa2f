//! # Conflict Retry
//!
//! Bounded retry for optimistic-concurrency writes. The operation is re-run
//! from scratch (re-fetch, recompute, re-write) each time the remote API
//! answers with a version conflict; any other failure is returned at once.

use crate::constants::{DEFAULT_CONFLICT_RETRY_DELAY_MS, DEFAULT_MAX_CONFLICT_RETRIES};
use crate::error::ClientError;
use crate::observability::metrics;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Errors that can report whether they are a version conflict
pub trait ConflictAware {
    fn is_conflict(&self) -> bool;
}

impl ConflictAware for ClientError {
    fn is_conflict(&self) -> bool {
        ClientError::is_conflict(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictRetry {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between a conflict and the next attempt
    pub delay: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_CONFLICT_RETRIES,
            delay: Duration::from_millis(DEFAULT_CONFLICT_RETRY_DELAY_MS),
        }
    }
}

impl ConflictRetry {
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt hit a conflict; `last` is the final one
    Exhausted { attempts: u32, last: E },
    /// A non-conflict failure
    Failed(E),
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or
/// `policy.max_attempts` attempts have all conflicted
///
/// The operation receives the 1-based attempt number.
///
/// # Errors
///
/// [`RetryError::Exhausted`] or [`RetryError::Failed`] as described above.
pub async fn retry_on_conflict<F, Fut, T, E>(
    policy: &ConflictRetry,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ConflictAware + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_conflict() => return Err(RetryError::Failed(e)),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    operation = %operation_name,
                    attempts = attempt,
                    error = %e,
                    "Conflict retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                metrics::increment_conflict_retries_total();
                debug!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    "Version conflict, retrying"
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}
