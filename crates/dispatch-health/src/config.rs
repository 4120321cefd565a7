//! Threshold configuration for health tracking and breakers
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Consecutive-failure counts at which an engine changes health state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub degraded_after: u32,
    pub failing_after: u32,
    pub failed_after: u32,
    /// Average latency (ms) at which performance degradation starts rising
    pub slow_call_ms: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after: 2,
            failing_after: 3,
            failed_after: 5,
            slow_call_ms: 2000,
        }
    }
}

impl HealthThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if self.degraded_after == 0 {
            return Err("health.degraded_after must be at least 1".to_string());
        }
        if !(self.degraded_after <= self.failing_after && self.failing_after <= self.failed_after) {
            return Err(format!(
                "health thresholds must ascend: degraded_after={} failing_after={} failed_after={}",
                self.degraded_after, self.failing_after, self.failed_after
            ));
        }
        if self.slow_call_ms == 0 {
            return Err("health.slow_call_ms must be positive".to_string());
        }
        Ok(())
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures before the breaker opens
    pub failure_threshold: u32,
    /// Time an open breaker waits before allowing a trial call
    pub recovery_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
        }
    }
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("breaker.failure_threshold must be at least 1".to_string());
        }
        Ok(())
    }
}
