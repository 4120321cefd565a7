//! Engine Registry
//!
//! Holds one [`EngineDescriptor`] per engine. Descriptors are registered at
//! startup with a constructor; the engine itself is only built the first
//! time a request needs it (see [`EngineRegistry::ensure_loaded`]).
use dispatch_core::{panic_message, EngineCategory, EngineError, EngineId, SharedEngine};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Constructor invoked on first use of an engine.
pub type EngineFactory = Arc<dyn Fn() -> Result<SharedEngine, EngineError> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("REGISTRY/duplicate engine id {0}")]
    DuplicateEngine(EngineId),

    #[error("REGISTRY/engine {0} has no triggers")]
    NoTriggers(EngineId),

    #[error("REGISTRY/engine {0} has an empty trigger")]
    EmptyTrigger(EngineId),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("LOAD/unknown engine {0}")]
    UnknownEngine(EngineId),

    #[error("LOAD/{engine}: {source}")]
    Failed {
        engine: EngineId,
        #[source]
        source: EngineError,
    },
}

impl LoadError {
    /// The failure as the engine would have reported it.
    pub fn engine_error(&self) -> EngineError {
        match self {
            Self::UnknownEngine(id) => EngineError::Load(format!("unknown engine {}", id)),
            Self::Failed { source, .. } => source.clone(),
        }
    }
}

struct LoadedEngine {
    engine: SharedEngine,
    load_time: Duration,
}

/// Static description of an engine plus its lazily filled instance slot.
pub struct EngineDescriptor {
    pub id: EngineId,
    pub category: EngineCategory,
    /// Lower value = higher precedence
    pub priority: i32,
    pub description: String,
    /// Literal substrings that make the engine a candidate
    pub triggers: Vec<String>,
    lowered_triggers: Vec<String>,
    factory: EngineFactory,
    loaded: OnceCell<LoadedEngine>,
    usage_count: AtomicU64,
}

impl EngineDescriptor {
    pub fn new<F>(
        id: impl Into<EngineId>,
        category: EngineCategory,
        priority: i32,
        description: impl Into<String>,
        triggers: Vec<String>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Result<SharedEngine, EngineError> + Send + Sync + 'static,
    {
        let lowered_triggers = triggers.iter().map(|t| t.to_lowercase()).collect();
        Self {
            id: id.into(),
            category,
            priority,
            description: description.into(),
            triggers,
            lowered_triggers,
            factory: Arc::new(factory),
            loaded: OnceCell::new(),
            usage_count: AtomicU64::new(0),
        }
    }

    /// Case-insensitive trigger test. `lowered_sentence` must already be lowercase.
    pub fn matches(&self, lowered_sentence: &str) -> bool {
        self.lowered_triggers
            .iter()
            .any(|t| lowered_sentence.contains(t.as_str()))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    pub fn load_time(&self) -> Option<Duration> {
        self.loaded.get().map(|l| l.load_time)
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    fn ensure_loaded(&self) -> Result<SharedEngine, LoadError> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(Arc::clone(&loaded.engine));
        }

        // OnceCell serializes initializers for this descriptor only; a failed
        // initializer leaves the cell empty so a later request can retry.
        let loaded = self.loaded.get_or_try_init(|| {
            let start = Instant::now();
            let built = catch_unwind(AssertUnwindSafe(|| (self.factory)())).unwrap_or_else(
                |payload| Err(EngineError::Load(panic_message(payload.as_ref()))),
            );
            match built {
                Ok(engine) => {
                    let load_time = start.elapsed();
                    info!(
                        engine = %self.id,
                        load_ms = load_time.as_secs_f64() * 1000.0,
                        "engine loaded"
                    );
                    Ok(LoadedEngine { engine, load_time })
                }
                Err(source) => {
                    warn!(engine = %self.id, error = %source, "engine failed to load");
                    Err(LoadError::Failed {
                        engine: self.id.clone(),
                        source,
                    })
                }
            }
        })?;

        Ok(Arc::clone(&loaded.engine))
    }
}

impl std::fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("triggers", &self.triggers)
            .field("loaded", &self.is_loaded())
            .field("usage_count", &self.usage_count())
            .finish()
    }
}

/// Per-engine row of [`EngineInfo`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineSummary {
    pub priority: i32,
    pub category: EngineCategory,
    pub description: String,
    pub loaded: bool,
    /// Load duration in milliseconds, once loaded
    #[serde(rename = "load_time")]
    pub load_time_ms: Option<f64>,
    pub usage_count: u64,
}

/// Registry overview reported by the controller.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub registered_count: usize,
    pub loaded_count: usize,
    pub engines: BTreeMap<String, EngineSummary>,
}

/// Table of registered engines, in registration order.
#[derive(Default)]
pub struct EngineRegistry {
    descriptors: Vec<EngineDescriptor>,
    index: HashMap<EngineId, usize>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Nothing is constructed here.
    pub fn register(&mut self, descriptor: EngineDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateEngine(descriptor.id));
        }
        if descriptor.triggers.is_empty() {
            return Err(RegistryError::NoTriggers(descriptor.id));
        }
        // An empty substring would match every sentence
        if descriptor.triggers.iter().any(|t| t.is_empty()) {
            return Err(RegistryError::EmptyTrigger(descriptor.id));
        }
        debug!(engine = %descriptor.id, priority = descriptor.priority, "engine registered");
        self.index
            .insert(descriptor.id.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn get(&self, id: &EngineId) -> Option<&EngineDescriptor> {
        self.index.get(id).map(|&i| &self.descriptors[i])
    }

    /// Position of `id` in registration order.
    pub fn position(&self, id: &EngineId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &EngineDescriptor> {
        self.descriptors.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EngineId> {
        self.descriptors.iter().map(|d| &d.id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Return the engine for `id`, constructing it on first use.
    ///
    /// Loading an already built engine takes no lock and does not touch its
    /// load time. Concurrent first uses construct the engine exactly once.
    pub fn ensure_loaded(&self, id: &EngineId) -> Result<SharedEngine, LoadError> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| LoadError::UnknownEngine(id.clone()))?;
        descriptor.ensure_loaded()
    }

    /// Count one invocation of `id`.
    pub fn record_usage(&self, id: &EngineId) {
        if let Some(d) = self.get(id) {
            d.usage_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.is_loaded()).count()
    }

    pub fn info(&self) -> EngineInfo {
        let engines = self
            .descriptors
            .iter()
            .map(|d| {
                (
                    d.id.to_string(),
                    EngineSummary {
                        priority: d.priority,
                        category: d.category,
                        description: d.description.clone(),
                        loaded: d.is_loaded(),
                        load_time_ms: d.load_time().map(|t| t.as_secs_f64() * 1000.0),
                        usage_count: d.usage_count(),
                    },
                )
            })
            .collect();

        EngineInfo {
            registered_count: self.descriptors.len(),
            loaded_count: self.loaded_count(),
            engines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{EngineOutput, GrammarEngine, SlotMap};
    use std::sync::atomic::AtomicUsize;

    struct Fixed;

    impl GrammarEngine for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn process(&self, _sentence: &str) -> Result<EngineOutput, EngineError> {
            Ok(EngineOutput::matched(SlotMap::new().with("S", "x")))
        }
    }

    fn descriptor(id: &str, builds: Arc<AtomicUsize>) -> EngineDescriptor {
        EngineDescriptor::new(
            id,
            EngineCategory::Other,
            10,
            "test engine",
            vec!["fixed".to_string()],
            move || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Fixed) as SharedEngine)
            },
        )
    }

    #[test]
    fn test_register_does_not_construct() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut registry = EngineRegistry::new();
        registry.register(descriptor("a", builds.clone())).unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 0);
        assert_eq!(registry.loaded_count(), 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut registry = EngineRegistry::new();
        registry.register(descriptor("a", builds.clone())).unwrap();
        let err = registry.register(descriptor("a", builds)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateEngine(EngineId::from("a")));
    }

    #[test]
    fn test_trigger_rules() {
        let mut registry = EngineRegistry::new();
        let silent = EngineDescriptor::new(
            "silent",
            EngineCategory::Other,
            1,
            "no triggers",
            Vec::new(),
            || Ok(Arc::new(Fixed) as SharedEngine),
        );
        assert_eq!(
            registry.register(silent).unwrap_err(),
            RegistryError::NoTriggers(EngineId::from("silent"))
        );

        // One empty trigger among real ones is still refused
        let blank = EngineDescriptor::new(
            "blank",
            EngineCategory::Other,
            1,
            "empty trigger",
            vec!["foo".to_string(), String::new()],
            || Ok(Arc::new(Fixed) as SharedEngine),
        );
        assert_eq!(
            registry.register(blank).unwrap_err(),
            RegistryError::EmptyTrigger(EngineId::from("blank"))
        );
        assert!(registry.get(&EngineId::from("blank")).is_none());

        // A lone space is a catch-all for multi-word sentences
        let catch_all = EngineDescriptor::new(
            "any",
            EngineCategory::Other,
            1,
            "catch-all",
            vec![" ".to_string()],
            || Ok(Arc::new(Fixed) as SharedEngine),
        );
        registry.register(catch_all).unwrap();
        assert!(registry.get(&EngineId::from("any")).unwrap().matches("two words"));
    }

    #[test]
    fn test_ensure_loaded_is_idempotent() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut registry = EngineRegistry::new();
        registry.register(descriptor("a", builds.clone())).unwrap();
        let id = EngineId::from("a");

        let first = registry.ensure_loaded(&id).unwrap();
        let load_time = registry.get(&id).unwrap().load_time();
        let second = registry.ensure_loaded(&id).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get(&id).unwrap().load_time(), load_time);
        // Loading is not usage
        assert_eq!(registry.get(&id).unwrap().usage_count(), 0);
    }

    #[test]
    fn test_unknown_engine() {
        let registry = EngineRegistry::new();
        let err = registry.ensure_loaded(&EngineId::from("ghost")).err().unwrap();
        assert_eq!(err, LoadError::UnknownEngine(EngineId::from("ghost")));
    }

    #[test]
    fn test_failed_load_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let mut registry = EngineRegistry::new();
        registry
            .register(EngineDescriptor::new(
                "flaky",
                EngineCategory::Other,
                1,
                "fails once",
                vec!["x".to_string()],
                move || {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(EngineError::Load("grammar missing".into()))
                    } else {
                        Ok(Arc::new(Fixed) as SharedEngine)
                    }
                },
            ))
            .unwrap();
        let id = EngineId::from("flaky");

        let err = registry.ensure_loaded(&id).err().unwrap();
        assert_eq!(err.engine_error(), EngineError::Load("grammar missing".into()));
        assert!(!registry.get(&id).unwrap().is_loaded());

        assert!(registry.ensure_loaded(&id).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_constructor_is_a_load_error() {
        let mut registry = EngineRegistry::new();
        registry
            .register(EngineDescriptor::new(
                "boom",
                EngineCategory::Other,
                1,
                "panics",
                vec!["x".to_string()],
                || panic!("constructor exploded"),
            ))
            .unwrap();

        let err = registry.ensure_loaded(&EngineId::from("boom")).err().unwrap();
        assert_eq!(
            err.engine_error(),
            EngineError::Load("constructor exploded".into())
        );
    }

    #[test]
    fn test_info_reports_usage() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut registry = EngineRegistry::new();
        registry.register(descriptor("a", builds.clone())).unwrap();
        registry.register(descriptor("b", builds)).unwrap();
        let a = EngineId::from("a");

        registry.ensure_loaded(&a).unwrap();
        registry.record_usage(&a);
        registry.record_usage(&a);

        let info = registry.info();
        assert_eq!(info.registered_count, 2);
        assert_eq!(info.loaded_count, 1);
        assert_eq!(info.engines["a"].usage_count, 2);
        assert!(info.engines["a"].load_time_ms.is_some());
        assert!(!info.engines["b"].loaded);

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["engines"]["a"]["load_time"].is_number());
        assert!(json["engines"]["b"]["load_time"].is_null());
        assert!(json["engines"]["a"].get("load_time_ms").is_none());
    }
}
