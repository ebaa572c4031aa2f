//! # Fibonacci Backoff
//!
//! Requeue delays after failed reconciles grow along the Fibonacci sequence
//! (min, min, 2·min, 3·min, 5·min, ...) and are capped at a maximum. The
//! growth is gentler than doubling, which suits errors such as a bundle
//! server that is briefly unreachable.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    max_secs: u64,
    prev_secs: u64,
    current_secs: u64,
}

impl FibonacciBackoff {
    /// `min_secs` is clamped to at least one second and `max_secs` to at least `min_secs`
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            max_secs: max_secs.max(min_secs),
            prev_secs: 0,
            current_secs: min_secs,
        }
    }

    /// Return the current delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        Duration::from_secs(delay)
    }
}

/// Per-object backoff, keyed by DataScienceCluster name in the reconciler context
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt
    pub fn record_error(&mut self) -> Duration {
        self.error_count = self.error_count.saturating_add(1);
        self.backoff.next_backoff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut FibonacciBackoff, n: usize) -> Vec<u64> {
        (0..n).map(|_| backoff.next_backoff().as_secs()).collect()
    }

    #[test]
    fn test_sequence_is_fibonacci_and_capped() {
        let mut backoff = FibonacciBackoff::new(5, 60);
        assert_eq!(secs(&mut backoff, 8), vec![5, 5, 10, 15, 25, 40, 60, 60]);
    }

    #[test]
    fn test_bounds_are_clamped() {
        let mut backoff = FibonacciBackoff::new(0, 0);
        assert_eq!(secs(&mut backoff, 3), vec![1, 1, 1]);
    }

    #[test]
    fn test_state_counts_errors() {
        let mut state = BackoffState::new(5, 300);
        assert_eq!(state.record_error(), Duration::from_secs(5));
        assert_eq!(state.record_error(), Duration::from_secs(5));
        assert_eq!(state.record_error(), Duration::from_secs(10));
        assert_eq!(state.error_count, 3);
    }
}
