//! Dispatch Registry: engine descriptors, lazy loading and selection
//!
//! # Flow
//!
//! ```text
//! sentence → find_candidates (triggers, no loading) → select (heuristics)
//!                                                        ↓
//!                                         ensure_loaded (first use only)
//! ```

pub mod engine_registry;
pub mod matcher;
pub mod selector;

pub use engine_registry::{
    EngineDescriptor, EngineFactory, EngineInfo, EngineRegistry, EngineSummary, LoadError,
    RegistryError,
};
pub use matcher::{find_candidates, Candidate};
pub use selector::select;
