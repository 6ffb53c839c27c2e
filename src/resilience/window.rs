//! Rolling outcome window.
//!
//! # Responsibilities
//! - Keep the last `capacity` call outcomes (oldest evicted first)
//! - Maintain lifetime counters and a running mean latency
//! - Answer recent and lifetime failure-rate queries
//!
//! # Design Decisions
//! - Aggregates are updated incrementally on every record, never recomputed
//! - The buffer is private; callers only see derived values

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// A single completed (or timed-out) call.
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    pub success: bool,
    pub recorded_at: Instant,
    pub latency: Duration,
}

/// Fixed-capacity FIFO of recent outcomes plus lifetime aggregates.
#[derive(Debug, Clone)]
pub struct MetricsWindow {
    outcomes: VecDeque<Outcome>,
    capacity: usize,
    /// Failures currently inside `outcomes`.
    window_failures: usize,
    total: u64,
    successes: u64,
    failures: u64,
    /// Mean latency in seconds over every recorded call.
    mean_latency_secs: f64,
    last_success_at: Option<u64>,
    last_failure_at: Option<u64>,
}

impl MetricsWindow {
    /// Create an empty window. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            window_failures: 0,
            total: 0,
            successes: 0,
            failures: 0,
            mean_latency_secs: 0.0,
            last_success_at: None,
            last_failure_at: None,
        }
    }

    /// Record one outcome.
    pub fn record(&mut self, success: bool, latency: Duration) {
        if self.outcomes.len() == self.capacity {
            if let Some(evicted) = self.outcomes.pop_front() {
                if !evicted.success {
                    self.window_failures -= 1;
                }
            }
        }

        self.outcomes.push_back(Outcome {
            success,
            recorded_at: Instant::now(),
            latency,
        });

        self.total += 1;
        let now = unix_millis();
        if success {
            self.successes += 1;
            self.last_success_at = Some(now);
        } else {
            self.failures += 1;
            self.window_failures += 1;
            self.last_failure_at = Some(now);
        }

        self.mean_latency_secs +=
            (latency.as_secs_f64() - self.mean_latency_secs) / self.total as f64;
    }

    /// Failures in the window divided by window length; 0 when empty.
    pub fn recent_failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.window_failures as f64 / self.outcomes.len() as f64
    }

    /// Failures divided by every call ever recorded; 0 when nothing recorded.
    pub fn lifetime_failure_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failures as f64 / self.total as f64
    }

    pub fn average_latency(&self) -> Duration {
        Duration::from_secs_f64(self.mean_latency_secs.max(0.0))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Unix timestamp (ms) of the most recent success.
    pub fn last_success_at(&self) -> Option<u64> {
        self.last_success_at
    }

    /// Unix timestamp (ms) of the most recent failure.
    pub fn last_failure_at(&self) -> Option<u64> {
        self.last_failure_at
    }

    /// Most recent outcome, if any.
    pub fn latest(&self) -> Option<&Outcome> {
        self.outcomes.back()
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_empty_window_rates() {
        let window = MetricsWindow::new(10);
        assert_eq!(window.recent_failure_rate(), 0.0);
        assert_eq!(window.lifetime_failure_rate(), 0.0);
        assert_eq!(window.average_latency(), Duration::ZERO);
        assert!(window.is_empty());
    }

    #[test]
    fn test_eviction_updates_recent_rate() {
        let mut window = MetricsWindow::new(3);
        window.record(false, ms(10));
        window.record(false, ms(10));
        window.record(true, ms(10));
        assert!((window.recent_failure_rate() - 2.0 / 3.0).abs() < 1e-9);

        // Both failures age out.
        window.record(true, ms(10));
        window.record(true, ms(10));
        assert_eq!(window.len(), 3);
        assert_eq!(window.recent_failure_rate(), 0.0);

        // Lifetime still remembers them.
        assert_eq!(window.total(), 5);
        assert_eq!(window.failures(), 2);
        assert!((window.lifetime_failure_rate() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_running_mean_latency() {
        let mut window = MetricsWindow::new(2);
        window.record(true, ms(100));
        window.record(true, ms(200));
        window.record(false, ms(300));
        // Mean covers every call, not only the window.
        let avg = window.average_latency().as_secs_f64();
        assert!((avg - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_timestamps_track_last_outcome_kind() {
        let mut window = MetricsWindow::new(4);
        assert!(window.last_success_at().is_none());
        window.record(true, ms(1));
        assert!(window.last_success_at().is_some());
        assert!(window.last_failure_at().is_none());
        window.record(false, ms(1));
        assert!(window.last_failure_at().is_some());
        assert!(!window.latest().unwrap().success);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = MetricsWindow::new(0);
        window.record(true, ms(1));
        window.record(false, ms(1));
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.len(), 1);
        assert_eq!(window.recent_failure_rate(), 1.0);
    }

    proptest! {
        #[test]
        fn prop_window_never_exceeds_capacity(
            capacity in 1usize..64,
            outcomes in proptest::collection::vec(any::<bool>(), 0..256),
        ) {
            let mut window = MetricsWindow::new(capacity);
            for success in &outcomes {
                window.record(*success, ms(1));
                prop_assert!(window.len() <= capacity);
            }

            let tail = outcomes.iter().rev().take(capacity);
            let expected_failures = tail.clone().filter(|s| !**s).count();
            let expected_len = tail.count();
            prop_assert_eq!(window.len(), expected_len);
            if expected_len > 0 {
                let expected = expected_failures as f64 / expected_len as f64;
                prop_assert!((window.recent_failure_rate() - expected).abs() < 1e-9);
            }
            prop_assert_eq!(window.total(), outcomes.len() as u64);
        }
    }
}
