//! Dispatch Core: engine contract, result model and error taxonomy
//!
//! Every other crate in the workspace builds on these types. Grammar engines
//! implement [`GrammarEngine`]; the controller turns their raw
//! [`EngineOutput`] into a normalized [`EngineResult`].

pub mod context;
pub mod data_model;
pub mod engine;
pub mod error;

pub use context::RequestContext;
pub use data_model::{
    is_known_slot, normalize_confidence, EngineCategory, EngineId, EngineResult, SlotMap,
    CORE_SLOTS,
};
pub use engine::{EngineOutput, GrammarEngine, SharedEngine};
pub use error::{panic_message, DispatchError, EngineError};

/// Controller version reported in every result's metadata
pub const CONTROLLER_VERSION: &str = "1.0.0";
