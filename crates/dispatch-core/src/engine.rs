//! Engine Trait: the contract every grammar engine implements
use crate::data_model::SlotMap;
use crate::error::EngineError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A pluggable recognizer for one English construction.
pub trait GrammarEngine: Send + Sync {
    /// Engine name, used in logs and result metadata
    fn name(&self) -> &str;

    /// Optional fast-path applicability check.
    ///
    /// `None` means the engine has no opinion and the registry's trigger
    /// strings decide.
    fn is_applicable(&self, _sentence: &str) -> Option<bool> {
        None
    }

    /// Extract slots from `sentence`.
    fn process(&self, sentence: &str) -> Result<EngineOutput, EngineError>;
}

/// Shared handle to a constructed engine.
pub type SharedEngine = Arc<dyn GrammarEngine>;

/// Raw engine answer before normalization by the controller.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub slots: SlotMap,
    pub metadata: HashMap<String, Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl EngineOutput {
    pub fn matched(slots: SlotMap) -> Self {
        Self {
            slots,
            metadata: HashMap::new(),
            success: true,
            error: None,
        }
    }

    pub fn unmatched(error: impl Into<String>) -> Self {
        Self {
            slots: SlotMap::new(),
            metadata: HashMap::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
