//! Circuit breaker for a single engine.
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → HalfOpen: first can_execute() after recovery_timeout
//! HalfOpen → Closed: recorded success
//! HalfOpen → Open: recorded failure (failure_count is still over threshold)
//! ```
//!
//! The breaker does not limit trial calls in HalfOpen; the controller makes
//! one attempt per engine per request.

use crate::config::BreakerConfig;
use dispatch_core::EngineId;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Point-in-time view of a breaker, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    engine: EngineId,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(engine: EngineId, config: &BreakerConfig) -> Self {
        Self {
            engine,
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout(),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_time: None,
            }),
        }
    }

    pub fn engine(&self) -> &EngineId {
        &self.engine
    }

    /// Whether a call may go through right now.
    ///
    /// An open breaker whose recovery timeout has elapsed moves to HalfOpen
    /// here and lets the call through.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    info!(engine = %self.engine, "circuit breaker half-open");
                    inner.state = BreakerState::HalfOpen;
                }
                elapsed
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        if inner.state == BreakerState::HalfOpen {
            info!(engine = %self.engine, "circuit breaker closed");
            inner.state = BreakerState::Closed;
        }
    }

    /// Count a failure. Returns `true` when this failure opened the breaker.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        if inner.failure_count >= self.failure_threshold && inner.state != BreakerState::Open {
            warn!(
                engine = %self.engine,
                failures = inner.failure_count,
                "circuit breaker opened"
            );
            inner.state = BreakerState::Open;
            return true;
        }
        false
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Close the breaker and clear its failure count.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure_time = None;
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.failure_threshold,
            recovery_timeout_ms: self.recovery_timeout.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            EngineId::from("test"),
            &BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout_ms: timeout_ms,
            },
        )
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        let cb = breaker(5, 60_000);
        for _ in 0..4 {
            assert!(!cb.record_failure());
            assert_eq!(cb.state(), BreakerState::Closed);
            assert!(cb.can_execute());
        }
        assert!(cb.record_failure());
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let cb = breaker(1, 20);
        cb.record_failure();
        assert!(!cb.can_execute());

        thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        // HalfOpen keeps allowing calls until an outcome is recorded
        assert!(cb.can_execute());

        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_failed_trial_reopens() {
        let cb = breaker(2, 20);
        cb.record_failure();
        cb.record_failure();
        thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());

        assert!(cb.record_failure());
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_reset_and_snapshot() {
        let cb = breaker(1, 60_000);
        cb.record_failure();
        let snap = cb.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.failure_threshold, 1);
        assert_eq!(snap.recovery_timeout_ms, 60_000);

        cb.reset();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.can_execute());
    }
}
