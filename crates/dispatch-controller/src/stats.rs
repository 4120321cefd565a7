//! Processing statistics
//!
//! Lock-free counters shared by all requests of one controller.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ProcessingStats {
    total_requests: AtomicU64,
    successful_processes: AtomicU64,
    fallback_activations: AtomicU64,
    circuit_breaker_trips: AtomicU64,
    graceful_degradations: AtomicU64,
    partial_successes: AtomicU64,
    total_processing_us: AtomicU64,
}

/// Serializable view returned by `get_processing_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_processes: u64,
    pub fallback_activations: u64,
    pub circuit_breaker_trips: u64,
    pub successful_recoveries: u64,
    pub graceful_degradations: u64,
    pub partial_successes: u64,
    /// Mean wall time per request, in milliseconds
    pub average_processing_time: f64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn success(&self) {
        self.successful_processes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fallback(&self) {
        self.fallback_activations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn breaker_trip(&self) {
        self.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn graceful_degradation(&self) {
        self.graceful_degradations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn partial_success(&self) {
        self.partial_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn processing_time(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_processing_us.fetch_add(us, Ordering::Relaxed);
    }

    /// Counters as of now; `successful_recoveries` is owned by the health monitor.
    pub fn snapshot(&self, successful_recoveries: u64) -> StatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let total_us = self.total_processing_us.load(Ordering::Relaxed);
        let average_processing_time = if total == 0 {
            0.0
        } else {
            total_us as f64 / total as f64 / 1000.0
        };

        StatsSnapshot {
            total_requests: total,
            successful_processes: self.successful_processes.load(Ordering::Relaxed),
            fallback_activations: self.fallback_activations.load(Ordering::Relaxed),
            circuit_breaker_trips: self.circuit_breaker_trips.load(Ordering::Relaxed),
            successful_recoveries,
            graceful_degradations: self.graceful_degradations.load(Ordering::Relaxed),
            partial_successes: self.partial_successes.load(Ordering::Relaxed),
            average_processing_time,
        }
    }
}
