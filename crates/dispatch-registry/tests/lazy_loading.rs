//! Concurrency tests for lazy engine construction.

use dispatch_core::{EngineCategory, EngineError, EngineId, EngineOutput, GrammarEngine, SharedEngine, SlotMap};
use dispatch_registry::{find_candidates, select, EngineDescriptor, EngineRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

struct Named(&'static str);

impl GrammarEngine for Named {
    fn name(&self) -> &str {
        self.0
    }

    fn process(&self, sentence: &str) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput::matched(SlotMap::new().with("S", sentence)))
    }
}

#[test]
fn test_concurrent_first_use_builds_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let mut registry = EngineRegistry::new();
    registry
        .register(EngineDescriptor::new(
            "slow",
            EngineCategory::Other,
            1,
            "slow to build",
            vec!["slow".to_string()],
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Ok(Arc::new(Named("slow")) as SharedEngine)
            },
        ))
        .unwrap();

    let registry = Arc::new(registry);
    let barrier = Arc::new(Barrier::new(8));
    let id = EngineId::from("slow");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            let id = id.clone();
            thread::spawn(move || {
                barrier.wait();
                let engine = registry.ensure_loaded(&id).unwrap();
                registry.record_usage(&id);
                engine
            })
        })
        .collect();

    let engines: Vec<SharedEngine> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(engines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

    let descriptor = registry.get(&id).unwrap();
    assert!(descriptor.load_time().unwrap() >= Duration::from_millis(50));
    assert_eq!(descriptor.usage_count(), 8);
}

#[test]
fn test_loading_one_engine_does_not_block_another() {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);

    let mut registry = EngineRegistry::new();
    registry
        .register(EngineDescriptor::new(
            "stuck",
            EngineCategory::Other,
            1,
            "waits for release",
            vec!["stuck".to_string()],
            move || {
                let _ = started_tx.lock().unwrap().send(());
                let _ = release_rx.lock().unwrap().recv();
                Ok(Arc::new(Named("stuck")) as SharedEngine)
            },
        ))
        .unwrap();
    registry
        .register(EngineDescriptor::new(
            "quick",
            EngineCategory::Other,
            2,
            "builds immediately",
            vec!["quick".to_string()],
            || Ok(Arc::new(Named("quick")) as SharedEngine),
        ))
        .unwrap();
    let registry = Arc::new(registry);

    let background = {
        let registry = registry.clone();
        thread::spawn(move || registry.ensure_loaded(&EngineId::from("stuck")).is_ok())
    };
    started_rx.recv().unwrap();

    // "stuck" is mid-construction; "quick" must still load
    let quick = registry.ensure_loaded(&EngineId::from("quick")).unwrap();
    assert_eq!(quick.name(), "quick");
    assert_eq!(registry.loaded_count(), 1);

    release_tx.send(()).unwrap();
    assert!(background.join().unwrap());
    assert_eq!(registry.loaded_count(), 2);
}

#[test]
fn test_match_then_select_without_loading() {
    let mut registry = EngineRegistry::new();
    for (id, category, priority, trigger) in [
        ("basic", EngineCategory::Other, 5, " "),
        ("inversion", EngineCategory::Inversion, 50, "never"),
    ] {
        registry
            .register(EngineDescriptor::new(
                id,
                category,
                priority,
                id,
                vec![trigger.to_string()],
                || Err(EngineError::Load("should not be built".into())),
            ))
            .unwrap();
    }

    let sentence = "Never have I seen such a beautiful sunset.";
    let candidates = find_candidates(&registry, sentence);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id.as_str(), "basic");
    assert_eq!(select(sentence, &candidates), Some(EngineId::from("inversion")));
    assert_eq!(registry.loaded_count(), 0);
}
