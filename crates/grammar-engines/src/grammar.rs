//! Grammar loading and compilation.
//!
//! Supports the engine grammar YAML format with:
//! - Multiple patterns per rule
//! - Free slots `{S}` and constrained slots `{Aux=was|were}`
//! - Optional commas

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
    #[error("GRAMMAR/invalid YAML: {0}")]
    Yaml(String),

    #[error("GRAMMAR/invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("GRAMMAR/no usable patterns")]
    Empty,
}

/// Top-level grammar file structure
#[derive(Debug, Clone, Deserialize)]
pub struct GrammarFile {
    pub version: String,
    pub rules: Vec<Rule>,
}

/// A construction variant with one or more surface patterns
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub patterns: Vec<String>,
}

/// Compiled grammar ready for matching
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub version: String,
    pub rules: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub description: String,
    pub patterns: Vec<CompiledPattern>,
}

/// A compiled pattern with its slot names in capture order
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub original: String,
    pub regex: regex::Regex,
    pub slot_names: Vec<String>,
    /// Specificity score (more literal chars = higher)
    pub specificity: usize,
}

impl CompiledGrammar {
    /// Compile a grammar from YAML content.
    ///
    /// Every pattern must compile; a grammar with no patterns is rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self, GrammarError> {
        let file: GrammarFile =
            serde_yaml::from_str(yaml).map_err(|e| GrammarError::Yaml(e.to_string()))?;

        let mut rules = Vec::with_capacity(file.rules.len());
        for rule in file.rules {
            let patterns = rule
                .patterns
                .iter()
                .map(|p| compile_pattern(p))
                .collect::<Result<Vec<_>, _>>()?;
            if !patterns.is_empty() {
                rules.push(CompiledRule {
                    name: rule.name,
                    description: rule.description,
                    patterns,
                });
            }
        }

        if rules.is_empty() {
            return Err(GrammarError::Empty);
        }

        Ok(CompiledGrammar {
            version: file.version,
            rules,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.iter().map(|r| r.patterns.len()).sum()
    }
}

/// Compile a pattern string with `{slot}` placeholders into a regex.
pub(crate) fn compile_pattern(pattern: &str) -> Result<CompiledPattern, GrammarError> {
    let invalid = |reason: &str| GrammarError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut regex_str = String::from("^");
    let mut slot_names = Vec::new();
    let mut specificity = 0;

    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    body.push(next);
                }
                if !closed {
                    return Err(invalid("unclosed slot"));
                }

                let (name, alternatives) = match body.split_once('=') {
                    Some((name, alts)) => (name.trim(), Some(alts)),
                    None => (body.trim(), None),
                };
                if name.is_empty() {
                    return Err(invalid("empty slot name"));
                }
                if slot_names.iter().any(|s| s == name) {
                    return Err(invalid("slot used twice"));
                }

                // Slot names like "sub-S" are not valid group names; index them instead
                let group = format!("g{}", slot_names.len());
                slot_names.push(name.to_string());

                match alternatives {
                    Some(alts) => {
                        let options: Vec<&str> =
                            alts.split('|').map(str::trim).filter(|a| !a.is_empty()).collect();
                        if options.is_empty() {
                            return Err(invalid("empty alternatives"));
                        }
                        specificity += options.iter().map(|a| a.len()).min().unwrap_or(0);
                        let escaped: Vec<String> =
                            options.iter().map(|a| regex::escape(a)).collect();
                        regex_str.push_str(&format!("(?P<{}>{})", group, escaped.join("|")));
                    }
                    // Non-greedy so earlier slots stay short
                    None => regex_str.push_str(&format!("(?P<{}>.+?)", group)),
                }
            }
            ',' => regex_str.push_str(",?"),
            _ => {
                if c.is_alphanumeric() || c == ' ' {
                    specificity += 1;
                }
                if "\\^$.|?*+()[]{}".contains(c) {
                    regex_str.push('\\');
                }
                regex_str.push(c);
            }
        }
    }

    regex_str.push('$');

    let regex = regex::RegexBuilder::new(&regex_str)
        .case_insensitive(true)
        .build()
        .map_err(|e| invalid(&e.to_string()))?;

    Ok(CompiledPattern {
        original: pattern.to_string(),
        regex,
        slot_names,
        specificity,
    })
}
