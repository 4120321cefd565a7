//! Dispatch Health: engine health states and circuit breakers
//!
//! Both are updated after every engine invocation. The health monitor
//! classifies engines from consecutive failures; the breaker gates calls to
//! an engine that keeps failing until a cool-down has passed.
//!
//! ```text
//! Healthy ─fail×2→ Degraded ─fail×3→ Failing ─fail×5→ Failed
//!    ↑                                                  │ cool-down
//!    └──────────────── success ──────────── Recovering ←┘
//!
//! Closed ─failures ≥ threshold→ Open ─timeout→ HalfOpen ─success→ Closed
//!                                 ↑                │
//!                                 └──── failure ───┘
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod health;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use config::{BreakerConfig, HealthThresholds};
pub use health::{EngineHealthStatus, HealthMonitor, HealthState};
