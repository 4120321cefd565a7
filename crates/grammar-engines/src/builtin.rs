//! Built-in engine table and registration.

use crate::engine::PatternEngine;
use dispatch_core::{EngineCategory, EngineError, SharedEngine};
use dispatch_registry::{EngineDescriptor, EngineRegistry, RegistryError};
use std::sync::Arc;

/// Static description of a built-in engine
#[derive(Debug, Clone, Copy)]
pub struct BuiltinSpec {
    pub id: &'static str,
    pub category: EngineCategory,
    pub priority: i32,
    pub description: &'static str,
    pub triggers: &'static [&'static str],
    pub grammar: &'static str,
}

const BUILTINS: &[BuiltinSpec] = &[
    BuiltinSpec {
        id: "conjunction",
        category: EngineCategory::Conjunction,
        priority: 10,
        description: "Adverbial clauses introduced by a subordinator",
        triggers: &["because", "although", "while", "since", "even though", "unless", "whereas"],
        grammar: include_str!("../grammars/conjunction.yaml"),
    },
    BuiltinSpec {
        id: "subjunctive",
        category: EngineCategory::Subjunctive,
        priority: 20,
        description: "Counterfactual conditionals and wish clauses",
        triggers: &["if ", " were ", " would ", " could ", " might ", "wish"],
        grammar: include_str!("../grammars/subjunctive.yaml"),
    },
    BuiltinSpec {
        id: "relative_clause",
        category: EngineCategory::RelativeClause,
        priority: 25,
        description: "Relative clauses on subjects and objects",
        triggers: &[" who ", " which ", " that ", " whom ", " whose "],
        grammar: include_str!("../grammars/relative_clause.yaml"),
    },
    BuiltinSpec {
        id: "passive",
        category: EngineCategory::Passive,
        priority: 30,
        description: "Passive voice with or without an agent",
        triggers: &[" by ", " was ", " were ", " been "],
        grammar: include_str!("../grammars/passive.yaml"),
    },
    BuiltinSpec {
        id: "inversion",
        category: EngineCategory::Inversion,
        priority: 40,
        description: "Negative inversion after a fronted adverbial",
        triggers: &["never", "rarely", "seldom", "hardly", "scarcely", "not only"],
        grammar: include_str!("../grammars/inversion.yaml"),
    },
    BuiltinSpec {
        id: "basic_clause",
        category: EngineCategory::Other,
        priority: 90,
        description: "Plain declarative clauses",
        triggers: &[" "],
        grammar: include_str!("../grammars/basic_clause.yaml"),
    },
];

/// All built-in engine specs, in registration order.
pub fn builtin_specs() -> &'static [BuiltinSpec] {
    BUILTINS
}

impl BuiltinSpec {
    /// Descriptor whose constructor compiles this entry's grammar.
    pub fn descriptor(&self) -> EngineDescriptor {
        let id = self.id;
        let grammar = self.grammar;
        EngineDescriptor::new(
            id,
            self.category,
            self.priority,
            self.description,
            self.triggers.iter().map(|t| t.to_string()).collect(),
            move || {
                PatternEngine::from_yaml(id, grammar)
                    .map(|engine| Arc::new(engine) as SharedEngine)
                    .map_err(|e| EngineError::Load(e.to_string()))
            },
        )
    }
}

/// Register every built-in engine. No grammar is compiled here.
pub fn register_builtin_engines(registry: &mut EngineRegistry) -> Result<(), RegistryError> {
    for spec in BUILTINS {
        registry.register(spec.descriptor())?;
    }
    Ok(())
}
