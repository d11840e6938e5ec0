//! Diagnostic counters and the final run report.
//!
//! Counters are written only by the arbitration loop. They are atomics so that
//! other tasks can observe progress while the loop runs; correctness never
//! depends on them.

use crate::pool::WorkerId;
use core::time::Duration;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Shared, read-mostly view of the balancer's counters.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    inner: Arc<Counters>,
}

impl Stats {
    /// Items handed to a worker.
    pub fn dispatched(&self) -> u64 {
        self.inner.dispatched.load(Ordering::Acquire)
    }

    /// Items whose completion the loop has processed, panicked ones included.
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Completed items whose operation panicked.
    pub fn panicked(&self) -> u64 {
        self.inner.panicked.load(Ordering::Acquire)
    }

    /// Dispatched items not yet completed.
    pub fn in_flight(&self) -> u64 {
        self.dispatched().saturating_sub(self.completed())
    }

    pub(crate) fn record_dispatch(&self) {
        self.inner.dispatched.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_completion(&self, panicked: bool) {
        if panicked {
            self.inner.panicked.fetch_add(1, Ordering::Release);
        }
        self.inner.completed.fetch_add(1, Ordering::Release);
    }
}

/// Why the arbitration loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The intake closed and every dispatched item completed.
    Drained,
    /// Neither intake nor completions were observed for the idle window.
    IdleTimeout,
    /// The balancer's cancellation token fired.
    Cancelled,
}

/// Per-worker totals at the time the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub dispatched: u64,
    /// Items still assigned when the loop stopped.
    pub pending: usize,
}

/// Summary returned by [`Balancer::run`](crate::Balancer::run).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub dispatched: u64,
    pub completed: u64,
    pub panicked: u64,
    pub reason: StopReason,
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
}

impl Report {
    /// Dispatched items that had not completed when the loop stopped.
    pub fn outstanding(&self) -> u64 {
        self.dispatched - self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_in_flight() {
        let stats = Stats::default();
        let view = stats.clone();

        stats.record_dispatch();
        stats.record_dispatch();
        stats.record_completion(true);

        assert_eq!(view.dispatched(), 2);
        assert_eq!(view.completed(), 1);
        assert_eq!(view.panicked(), 1);
        assert_eq!(view.in_flight(), 1);
    }
}
