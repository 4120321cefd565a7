//! Grammar engine backed by a compiled YAML grammar.

use crate::grammar::{CompiledGrammar, GrammarError};
use crate::matcher::match_text;
use crate::normalizer::normalize;
use dispatch_core::{EngineError, EngineOutput, GrammarEngine};
use serde_json::Value;
use tracing::debug;

#[derive(Debug)]
pub struct PatternEngine {
    name: String,
    grammar: CompiledGrammar,
}

impl PatternEngine {
    pub fn new(name: impl Into<String>, grammar: CompiledGrammar) -> Self {
        Self {
            name: name.into(),
            grammar,
        }
    }

    /// Compile `yaml` and wrap it as an engine.
    pub fn from_yaml(name: impl Into<String>, yaml: &str) -> Result<Self, GrammarError> {
        Ok(Self::new(name, CompiledGrammar::from_yaml(yaml)?))
    }
}

impl GrammarEngine for PatternEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, sentence: &str) -> Result<EngineOutput, EngineError> {
        let normalized = normalize(sentence);
        if normalized.is_empty() {
            return Err(EngineError::Runtime("nothing to parse".to_string()));
        }

        match match_text(&normalized, &self.grammar) {
            Some(m) => {
                debug!(engine = %self.name, rule = %m.rule, pattern = %m.pattern, "pattern matched");
                Ok(EngineOutput::matched(m.slots)
                    .with_metadata("rule", Value::from(m.rule))
                    .with_metadata("pattern", Value::from(m.pattern))
                    .with_metadata("grammar_version", Value::from(self.grammar.version.clone())))
            }
            None => Ok(EngineOutput::unmatched(format!(
                "no {} pattern matched",
                self.name
            ))),
        }
    }
}
