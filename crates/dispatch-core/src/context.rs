//! Request Context: per-request state carried through a dispatch
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub debug: bool,
    pub received_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(debug: bool) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            debug,
            received_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(false)
    }
}
