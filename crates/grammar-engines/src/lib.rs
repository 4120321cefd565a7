//! Grammar Engines: pattern-driven recognizers for English constructions
//!
//! Each engine is described by a YAML grammar whose patterns contain slot
//! placeholders:
//!
//! ```yaml
//! version: "1.0"
//! rules:
//!   - name: agent_passive
//!     description: Passive with a by-phrase
//!     patterns:
//!       - "{S} {Aux=was|were} {V} by {M1}"
//! ```
//!
//! `{NAME}` captures one or more words; `{NAME=a|b}` captures one of the
//! listed alternatives. A comma in a pattern is optional in the input.
//!
//! Grammars are compiled when the registry first loads the engine, never at
//! registration.
//!
//! # Example
//!
//! ```
//! use dispatch_core::GrammarEngine;
//! use grammar_engines::PatternEngine;
//!
//! let engine = PatternEngine::from_yaml("svo", r#"
//! version: "1.0"
//! rules:
//!   - name: transitive
//!     description: Subject verb object
//!     patterns:
//!       - "{S} {V} {O1}"
//! "#).unwrap();
//!
//! let out = engine.process("Dogs chase cats.").unwrap();
//! assert_eq!(out.slots.get("O1"), Some("cats"));
//! ```

pub mod builtin;
pub mod engine;
pub mod grammar;
pub mod matcher;
pub mod normalizer;

pub use builtin::{builtin_specs, register_builtin_engines, BuiltinSpec};
pub use engine::PatternEngine;
pub use grammar::{CompiledGrammar, GrammarError};
pub use matcher::{match_text, PatternMatch};
