//! Data Model: EngineId, SlotMap, EngineResult
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Slot names engines may emit directly; `sub-` prefixed variants are also accepted.
pub const CORE_SLOTS: [&str; 10] = ["S", "Aux", "V", "O1", "O2", "C1", "C2", "M1", "M2", "M3"];

const SUB_PREFIX: &str = "sub-";

/// Whether `key` belongs to the slot vocabulary.
pub fn is_known_slot(key: &str) -> bool {
    CORE_SLOTS.contains(&key)
        || key
            .strip_prefix(SUB_PREFIX)
            .map(|rest| CORE_SLOTS.contains(&rest))
            .unwrap_or(false)
}

/// Stable identifier of a registered engine (ex: "passive").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EngineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Construction family an engine recognizes.
///
/// The selector and the pattern-based fallback key their heuristics on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineCategory {
    Conjunction,
    Subjunctive,
    Passive,
    Inversion,
    RelativeClause,
    Other,
}

impl EngineCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conjunction => "conjunction",
            Self::Subjunctive => "subjunctive",
            Self::Passive => "passive",
            Self::Inversion => "inversion",
            Self::RelativeClause => "relative_clause",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EngineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered slot-name → text mapping with unique keys.
///
/// Insertion order is kept so results read in the order engines produced
/// them. Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMap {
    entries: Vec<(String, String)>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert, skipping blank values.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() {
            self.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Whether `key` is present with a non-blank value.
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into vocabulary slots and everything else.
    pub fn partition_known(self) -> (SlotMap, SlotMap) {
        let (known, unknown): (Vec<_>, Vec<_>) =
            self.entries.into_iter().partition(|(k, _)| is_known_slot(k));
        (SlotMap { entries: known }, SlotMap { entries: unknown })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SlotMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = SlotMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for SlotMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Confidence score for an engine result, derived from the slots it filled.
///
/// Base 0.5; +0.15 for each of `S` and `V`; +0.05 for each of `O1`, `C1`,
/// `M1`, `Aux`; +0.02 per `sub-*` key; clamped to [0, 1].
pub fn normalize_confidence(slots: &SlotMap) -> f64 {
    let mut confidence = 0.5;

    for key in ["S", "V"] {
        if slots.has_value(key) {
            confidence += 0.15;
        }
    }
    for key in ["O1", "C1", "M1", "Aux"] {
        if slots.has_value(key) {
            confidence += 0.05;
        }
    }
    let sub_keys = slots.keys().filter(|k| k.starts_with(SUB_PREFIX)).count();
    confidence += 0.02 * sub_keys as f64;

    confidence.clamp(0.0, 1.0)
}

fn duration_as_ms<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Normalized outcome of one `process_sentence` call.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    /// Engine (or fallback strategy) that produced the slots
    pub engine: EngineId,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    pub slots: SlotMap,
    pub metadata: HashMap<String, Value>,
    pub success: bool,
    #[serde(rename = "processing_time_ms", serialize_with = "duration_as_ms")]
    pub processing_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineResult {
    /// A failed result carrying no slots.
    pub fn failure(engine: EngineId, error: impl Into<String>) -> Self {
        Self {
            engine,
            confidence: 0.0,
            slots: SlotMap::new(),
            metadata: HashMap::new(),
            success: false,
            processing_time: Duration::ZERO,
            error: Some(error.into()),
        }
    }
}
