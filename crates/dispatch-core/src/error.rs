//! Unified Error Model
use std::time::Duration;
use thiserror::Error;

/// Failure reported by (or on behalf of) a single grammar engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("LOAD/{0}")]
    Load(String),

    #[error("RUNTIME/{0}")]
    Runtime(String),

    #[error("TIMEOUT/no answer within {0:?}")]
    Timeout(Duration),

    #[error("PANIC/{0}")]
    Panicked(String),
}

/// Request-level error taxonomy of the controller.
///
/// None of these escape `process_sentence`; they are converted into health
/// and breaker updates or into the `error` string of the final result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("INPUT/empty sentence")]
    EmptyInput,

    #[error("LOAD/{engine}: {reason}")]
    EngineLoad { engine: String, reason: String },

    #[error("RUNTIME/{engine}: {reason}")]
    EngineRuntime { engine: String, reason: String },

    #[error("MATCH/no applicable engine")]
    NoApplicableEngine,

    #[error("EXHAUSTED/all engines failed: {}", attempted.join(", "))]
    AllEnginesExhausted { attempted: Vec<String> },
}

impl DispatchError {
    /// Classify an engine failure the way the controller records it.
    pub fn from_engine(engine: &str, err: &EngineError) -> Self {
        match err {
            EngineError::Load(reason) => Self::EngineLoad {
                engine: engine.to_string(),
                reason: reason.clone(),
            },
            other => Self::EngineRuntime {
                engine: engine.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}
