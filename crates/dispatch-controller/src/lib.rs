//! Dispatch Controller: resilient routing of sentences to grammar engines
//!
//! # Example
//!
//! ```
//! use dispatch_controller::{ControllerConfig, ResilientController};
//!
//! let controller = ResilientController::with_builtin_engines(ControllerConfig::default()).unwrap();
//! let result = controller.process_sentence("Never have I seen such a beautiful sunset.", false);
//!
//! assert!(result.success);
//! assert_eq!(result.engine.as_str(), "inversion");
//! assert_eq!(result.slots.get("M1"), Some("Never"));
//! ```

pub mod config;
pub mod controller;
pub mod fallback;
pub mod stats;

pub use config::{ConfigError, ControllerConfig, EngineOverride, CONFIG_ENV};
pub use controller::{EngineHealthReport, ResilientController, SetupError, NO_ENGINE};
pub use fallback::FallbackStrategy;
pub use stats::{ProcessingStats, StatsSnapshot};
