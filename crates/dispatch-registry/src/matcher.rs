//! Applicability matching over the registry.
//!
//! Pure trigger-string scan: no engine is constructed. The candidate list is
//! ordered by descriptor priority, ties broken by registration order.

use crate::engine_registry::EngineRegistry;
use dispatch_core::{EngineCategory, EngineId};
use serde::Serialize;

/// An engine whose triggers matched the sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: EngineId,
    pub category: EngineCategory,
    pub priority: i32,
}

/// Engines whose triggers appear (case-insensitively) in `sentence`.
pub fn find_candidates(registry: &EngineRegistry, sentence: &str) -> Vec<Candidate> {
    let lowered = sentence.to_lowercase();

    let mut candidates: Vec<Candidate> = registry
        .descriptors()
        .filter(|d| d.matches(&lowered))
        .map(|d| Candidate {
            id: d.id.clone(),
            category: d.category,
            priority: d.priority,
        })
        .collect();

    // Stable sort keeps registration order among equal priorities
    candidates.sort_by_key(|c| c.priority);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_registry::EngineDescriptor;
    use dispatch_core::{EngineError, SharedEngine};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn registry_with(built: Arc<AtomicBool>) -> EngineRegistry {
        let mut registry = EngineRegistry::new();
        let specs: [(&str, EngineCategory, i32, &[&str]); 4] = [
            ("passive", EngineCategory::Passive, 20, &[" by ", "was ", "were "]),
            ("basic", EngineCategory::Other, 90, &[" "]),
            ("conjunction", EngineCategory::Conjunction, 10, &["because", "although"]),
            ("relative", EngineCategory::RelativeClause, 20, &[" who ", " which "]),
        ];
        for (id, category, priority, triggers) in specs {
            let flag = built.clone();
            registry
                .register(EngineDescriptor::new(
                    id,
                    category,
                    priority,
                    id,
                    triggers.iter().map(|t| t.to_string()).collect(),
                    move || -> Result<SharedEngine, EngineError> {
                        flag.store(true, Ordering::SeqCst);
                        Err(EngineError::Load("not needed".into()))
                    },
                ))
                .unwrap();
        }
        registry
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_candidates_sorted_by_priority() {
        let built = Arc::new(AtomicBool::new(false));
        let registry = registry_with(built.clone());

        let found = find_candidates(&registry, "The man who called was stopped by police because of speed");
        assert_eq!(ids(&found), vec!["conjunction", "passive", "relative", "basic"]);
        assert!(!built.load(Ordering::SeqCst), "matching must not load engines");
    }

    #[test]
    fn test_triggers_are_case_insensitive() {
        let registry = registry_with(Arc::new(AtomicBool::new(false)));
        let found = find_candidates(&registry, "BECAUSE it rained");
        assert_eq!(ids(&found), vec!["conjunction", "basic"]);
    }

    #[test]
    fn test_no_candidates() {
        let registry = registry_with(Arc::new(AtomicBool::new(false)));
        assert!(find_candidates(&registry, "Hello").is_empty());
    }
}
