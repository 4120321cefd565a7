//! Pattern matching against a compiled grammar.
//!
//! Every pattern of every rule is tried; the most specific match wins, with
//! ties going to the earlier rule and pattern.

use crate::grammar::CompiledGrammar;
use dispatch_core::SlotMap;

/// A successful grammar match
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Name of the matched rule
    pub rule: String,
    /// The pattern that matched
    pub pattern: String,
    pub specificity: usize,
    /// Extracted slots, in pattern order
    pub slots: SlotMap,
}

/// Match already-normalized text against a grammar
pub fn match_text(text: &str, grammar: &CompiledGrammar) -> Option<PatternMatch> {
    let mut best: Option<PatternMatch> = None;

    for rule in &grammar.rules {
        for pattern in &rule.patterns {
            if best
                .as_ref()
                .map(|b| pattern.specificity <= b.specificity)
                .unwrap_or(false)
            {
                continue;
            }
            let Some(captures) = pattern.regex.captures(text) else {
                continue;
            };

            let mut slots = SlotMap::new();
            for (i, name) in pattern.slot_names.iter().enumerate() {
                if let Some(m) = captures.name(&format!("g{}", i)) {
                    let value = m.as_str().trim().trim_end_matches(',');
                    if !value.is_empty() {
                        slots.insert(name.clone(), value);
                    }
                }
            }

            best = Some(PatternMatch {
                rule: rule.name.clone(),
                pattern: pattern.original.clone(),
                specificity: pattern.specificity,
                slots,
            });
        }
    }

    best
}
