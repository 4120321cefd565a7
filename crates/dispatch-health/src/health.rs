//! Engine health monitor.
//!
//! One entry per engine, each behind its own mutex so that updates for
//! different engines never contend.

use crate::config::HealthThresholds;
use chrono::{DateTime, Utc};
use dispatch_core::EngineId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Weight of the newest sample in the latency average.
const LATENCY_EWMA_ALPHA: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Failing,
    Failed,
    Recovering,
}

impl HealthState {
    /// States the controller tries first.
    pub fn is_preferred(&self) -> bool {
        matches!(self, Self::Healthy | Self::Recovering)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineHealthStatus {
    pub engine: EngineId,
    pub state: HealthState,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub recovery_attempts: u32,
    /// 0.0 normal to 1.0 severely degraded
    pub performance_degradation: f64,
}

impl EngineHealthStatus {
    fn new(engine: EngineId) -> Self {
        Self {
            engine,
            state: HealthState::Healthy,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            last_success_time: None,
            last_failure_time: None,
            last_error: None,
            recovery_attempts: 0,
            performance_degradation: 0.0,
        }
    }

    pub fn total_attempts(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Ranking score used to order retries; 0.5 for untried engines.
    pub fn score(&self) -> f64 {
        let total = self.total_attempts();
        if total == 0 {
            return 0.5;
        }
        let success_rate = self.success_count as f64 / total as f64;
        let penalty = (self.consecutive_failures as f64 * 0.1).min(0.5);
        (success_rate - penalty) * (1.0 - self.performance_degradation)
    }
}

#[derive(Debug)]
struct HealthEntry {
    status: EngineHealthStatus,
    last_failure_at: Option<Instant>,
    latency_ewma_ms: Option<f64>,
}

#[derive(Debug)]
pub struct HealthMonitor {
    entries: HashMap<EngineId, Mutex<HealthEntry>>,
    thresholds: HealthThresholds,
    successful_recoveries: AtomicU64,
}

impl HealthMonitor {
    /// Create a monitor tracking `engines`, all starting Healthy.
    pub fn new<'a>(engines: impl IntoIterator<Item = &'a EngineId>, thresholds: HealthThresholds) -> Self {
        let entries = engines
            .into_iter()
            .map(|id| {
                (
                    id.clone(),
                    Mutex::new(HealthEntry {
                        status: EngineHealthStatus::new(id.clone()),
                        last_failure_at: None,
                        latency_ewma_ms: None,
                    }),
                )
            })
            .collect();

        Self {
            entries,
            thresholds,
            successful_recoveries: AtomicU64::new(0),
        }
    }

    fn entry(&self, id: &EngineId) -> Option<&Mutex<HealthEntry>> {
        let entry = self.entries.get(id);
        if entry.is_none() {
            warn!(engine = %id, "health update for untracked engine");
        }
        entry
    }

    /// Record a successful call. Returns the new state.
    pub fn record_success(&self, id: &EngineId) -> Option<HealthState> {
        let mut entry = self.entry(id)?.lock();
        let status = &mut entry.status;
        let prior = status.state;

        status.success_count += 1;
        status.consecutive_failures = 0;
        status.last_success_time = Some(Utc::now());
        status.state = HealthState::Healthy;

        if matches!(
            prior,
            HealthState::Degraded | HealthState::Failing | HealthState::Recovering
        ) {
            self.successful_recoveries.fetch_add(1, Ordering::Relaxed);
            info!(engine = %id, from = ?prior, "engine recovered");
        }
        Some(status.state)
    }

    /// Record a failed call. Returns the new state.
    pub fn record_failure(&self, id: &EngineId, reason: &str) -> Option<HealthState> {
        let mut entry = self.entry(id)?.lock();
        entry.last_failure_at = Some(Instant::now());
        let status = &mut entry.status;
        let prior = status.state;

        status.failure_count += 1;
        status.consecutive_failures += 1;
        status.last_failure_time = Some(Utc::now());
        status.last_error = Some(reason.to_string());

        let consecutive = status.consecutive_failures;
        let t = &self.thresholds;
        if consecutive >= t.failed_after {
            status.state = HealthState::Failed;
        } else if consecutive >= t.failing_after {
            status.state = HealthState::Failing;
        } else if consecutive >= t.degraded_after {
            status.state = HealthState::Degraded;
        }

        if status.state != prior {
            warn!(
                engine = %id,
                from = ?prior,
                to = ?status.state,
                consecutive_failures = consecutive,
                reason,
                "engine health changed"
            );
        } else {
            debug!(engine = %id, consecutive_failures = consecutive, reason, "engine failure recorded");
        }
        Some(status.state)
    }

    /// Feed one call latency into the engine's performance degradation.
    pub fn record_latency(&self, id: &EngineId, elapsed: Duration) {
        let Some(entry) = self.entry(id) else { return };
        let mut entry = entry.lock();
        let sample = elapsed.as_secs_f64() * 1000.0;
        let ewma = match entry.latency_ewma_ms {
            Some(prev) => LATENCY_EWMA_ALPHA * sample + (1.0 - LATENCY_EWMA_ALPHA) * prev,
            None => sample,
        };
        entry.latency_ewma_ms = Some(ewma);

        let slow = self.thresholds.slow_call_ms as f64;
        entry.status.performance_degradation = ((ewma - slow) / slow).clamp(0.0, 1.0);
    }

    /// Move a Failed engine to Recovering once `cooldown` has passed since
    /// its last failure. Returns whether the engine may be tried.
    pub fn try_begin_recovery(&self, id: &EngineId, cooldown: Duration) -> bool {
        let Some(entry) = self.entry(id) else { return false };
        let mut entry = entry.lock();
        match entry.status.state {
            HealthState::Recovering => true,
            HealthState::Failed => {
                let cooled = entry
                    .last_failure_at
                    .map(|t| t.elapsed() >= cooldown)
                    .unwrap_or(true);
                if cooled {
                    entry.status.state = HealthState::Recovering;
                    entry.status.recovery_attempts += 1;
                    info!(
                        engine = %id,
                        attempt = entry.status.recovery_attempts,
                        "engine entering recovery"
                    );
                }
                cooled
            }
            _ => false,
        }
    }

    pub fn state(&self, id: &EngineId) -> Option<HealthState> {
        self.entries.get(id).map(|e| e.lock().status.state)
    }

    pub fn status(&self, id: &EngineId) -> Option<EngineHealthStatus> {
        self.entries.get(id).map(|e| e.lock().status.clone())
    }

    pub fn health_score(&self, id: &EngineId) -> f64 {
        self.entries
            .get(id)
            .map(|e| e.lock().status.score())
            .unwrap_or(0.5)
    }

    /// Operator override: mark the engine Healthy again, keeping its counters.
    pub fn reset(&self, id: &EngineId) -> bool {
        let Some(entry) = self.entries.get(id) else { return false };
        let mut entry = entry.lock();
        entry.status.state = HealthState::Healthy;
        entry.status.consecutive_failures = 0;
        true
    }

    /// All statuses ordered by engine id.
    pub fn snapshot(&self) -> Vec<EngineHealthStatus> {
        let mut all: Vec<EngineHealthStatus> =
            self.entries.values().map(|e| e.lock().status.clone()).collect();
        all.sort_by(|a, b| a.engine.cmp(&b.engine));
        all
    }

    pub fn successful_recoveries(&self) -> u64 {
        self.successful_recoveries.load(Ordering::Relaxed)
    }
}
