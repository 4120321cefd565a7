//! Controller configuration
//!
//! Every field has a default, so an empty YAML document is a valid config:
//!
//! ```yaml
//! health:
//!   degraded_after: 2
//!   failing_after: 3
//!   failed_after: 5
//!   slow_call_ms: 2000
//! breaker:
//!   failure_threshold: 5
//!   recovery_timeout_ms: 60000
//! engine_timeout_ms: 500
//! engines:
//!   passive:
//!     failure_threshold: 3
//! ```

use dispatch_core::EngineId;
use dispatch_health::{BreakerConfig, HealthThresholds};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a YAML config file for the binary.
pub const CONFIG_ENV: &str = "GRAMMAR_DISPATCH_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG/cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG/invalid YAML: {0}")]
    Yaml(String),

    #[error("CONFIG/{0}")]
    Invalid(String),
}

/// Per-engine breaker overrides; unset fields use the global breaker values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOverride {
    pub failure_threshold: Option<u32>,
    pub recovery_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub health: HealthThresholds,
    pub breaker: BreakerConfig,
    /// Upper bound on a single engine call; `None` runs engines inline
    pub engine_timeout_ms: Option<u64>,
    pub engines: HashMap<String, EngineOverride>,
}

impl ControllerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml reads an empty document as null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `GRAMMAR_DISPATCH_CONFIG` when set, defaults otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.health.validate().map_err(ConfigError::Invalid)?;
        self.breaker.validate().map_err(ConfigError::Invalid)?;
        if self.engine_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "engine_timeout_ms must be positive when set".to_string(),
            ));
        }
        for (id, over) in &self.engines {
            if over.failure_threshold == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "engines.{}.failure_threshold must be at least 1",
                    id
                )));
            }
        }
        Ok(())
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }

    /// Breaker settings for `id` after applying its override.
    pub fn breaker_for(&self, id: &EngineId) -> BreakerConfig {
        let mut config = self.breaker.clone();
        if let Some(over) = self.engines.get(id.as_str()) {
            if let Some(threshold) = over.failure_threshold {
                config.failure_threshold = threshold;
            }
            if let Some(timeout) = over.recovery_timeout_ms {
                config.recovery_timeout_ms = timeout;
            }
        }
        config
    }
}
