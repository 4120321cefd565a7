//! Scripted engines shared by the controller integration tests.
#![allow(dead_code)]

use dispatch_controller::{ControllerConfig, ResilientController};
use dispatch_core::{
    EngineCategory, EngineError, EngineOutput, GrammarEngine, SharedEngine, SlotMap,
};
use dispatch_registry::{EngineDescriptor, EngineRegistry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Engine whose behaviour tests can flip at runtime.
pub struct Switchable {
    name: String,
    pub healthy: AtomicBool,
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl Switchable {
    pub fn new(name: &str, healthy: bool) -> Arc<Self> {
        Self::slow(name, healthy, Duration::ZERO)
    }

    pub fn slow(name: &str, healthy: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            healthy: AtomicBool::new(healthy),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GrammarEngine for Switchable {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, sentence: &str) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(EngineError::Runtime(format!("{} is down", self.name)));
        }
        let mut words = sentence.split_whitespace();
        let slots = SlotMap::new()
            .with("S", words.next().unwrap_or(""))
            .with("V", words.next().unwrap_or(""));
        Ok(EngineOutput::matched(slots))
    }
}

/// Descriptor handing out the given shared instance on load.
pub fn descriptor(
    engine: &Arc<Switchable>,
    category: EngineCategory,
    priority: i32,
    triggers: &[&str],
) -> EngineDescriptor {
    let instance = Arc::clone(engine);
    EngineDescriptor::new(
        engine.name(),
        category,
        priority,
        format!("{} (scripted)", engine.name()),
        triggers.iter().map(|t| t.to_string()).collect(),
        move || Ok(Arc::clone(&instance) as SharedEngine),
    )
}

pub fn controller(engines: Vec<EngineDescriptor>, config: ControllerConfig) -> ResilientController {
    let mut registry = EngineRegistry::new();
    for d in engines {
        registry.register(d).unwrap();
    }
    ResilientController::new(registry, config).unwrap()
}

/// Config whose health ladder never leaves Healthy, isolating the breaker.
pub fn breaker_only(failure_threshold: u32, recovery_timeout_ms: u64) -> ControllerConfig {
    ControllerConfig::from_yaml(&format!(
        r#"
health:
  degraded_after: 100
  failing_after: 100
  failed_after: 100
breaker:
  failure_threshold: {}
  recovery_timeout_ms: {}
"#,
        failure_threshold, recovery_timeout_ms
    ))
    .unwrap()
}
