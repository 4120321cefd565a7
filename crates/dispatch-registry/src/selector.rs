//! Engine selection among applicable candidates.
//!
//! Fixed-order heuristics, first match wins:
//!
//! 1. conjunction engine + a subordinator
//! 2. subjunctive engine + at least two conditional markers
//! 3. passive engine + "by" with a form of "be"
//! 4. inversion engine + sentence opens with a negative adverbial
//! 5. otherwise the highest-priority candidate
//!
//! Words are compared on lowercase word boundaries, so "nearby" does not
//! count as "by". The outcome depends only on the sentence and the
//! candidate list, never on load or health state.

use crate::matcher::Candidate;
use dispatch_core::{EngineCategory, EngineId};

const SUBORDINATORS: &[&str] = &["because", "although", "while", "since", "even though"];
const CONDITIONAL_MARKERS: &[&str] = &["if", "were", "would", "could", "might", "wish"];
const BE_FORMS: &[&str] = &["was", "were", "been"];
const NEGATIVE_OPENERS: &[&str] = &["never", "rarely", "seldom", "hardly", "not only"];

/// Lowercase word tokens; apostrophes stay inside words.
fn words(sentence: &str) -> Vec<String> {
    sentence
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `phrase` (one or more words) occurs as a word sequence.
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
}

fn starts_with_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    !needle.is_empty()
        && needle.len() <= words.len()
        && words.iter().zip(&needle).all(|(a, b)| a == b)
}

fn find_category(candidates: &[Candidate], category: EngineCategory) -> Option<&Candidate> {
    candidates.iter().find(|c| c.category == category)
}

/// Pick one engine for `sentence`; `candidates` must be priority-ordered.
///
/// Returns `None` only when there are no candidates.
pub fn select(sentence: &str, candidates: &[Candidate]) -> Option<EngineId> {
    match candidates {
        [] => return None,
        [only] => return Some(only.id.clone()),
        _ => {}
    }

    let words = words(sentence);

    if let Some(c) = find_category(candidates, EngineCategory::Conjunction) {
        if SUBORDINATORS.iter().any(|s| contains_phrase(&words, s)) {
            return Some(c.id.clone());
        }
    }

    if let Some(c) = find_category(candidates, EngineCategory::Subjunctive) {
        let markers = CONDITIONAL_MARKERS
            .iter()
            .filter(|m| contains_phrase(&words, m))
            .count();
        if markers >= 2 {
            return Some(c.id.clone());
        }
    }

    if let Some(c) = find_category(candidates, EngineCategory::Passive) {
        if contains_phrase(&words, "by") && BE_FORMS.iter().any(|b| contains_phrase(&words, b)) {
            return Some(c.id.clone());
        }
    }

    if let Some(c) = find_category(candidates, EngineCategory::Inversion) {
        if NEGATIVE_OPENERS.iter().any(|o| starts_with_phrase(&words, o)) {
            return Some(c.id.clone());
        }
    }

    candidates.first().map(|c| c.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, category: EngineCategory, priority: i32) -> Candidate {
        Candidate {
            id: EngineId::from(id),
            category,
            priority,
        }
    }

    fn all() -> Vec<Candidate> {
        vec![
            candidate("basic", EngineCategory::Other, 1),
            candidate("conjunction", EngineCategory::Conjunction, 10),
            candidate("subjunctive", EngineCategory::Subjunctive, 20),
            candidate("passive", EngineCategory::Passive, 30),
            candidate("inversion", EngineCategory::Inversion, 40),
        ]
    }

    fn pick(sentence: &str) -> String {
        select(sentence, &all()).unwrap().to_string()
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(select("anything", &[]), None);
        let only = vec![candidate("passive", EngineCategory::Passive, 99)];
        assert_eq!(select("no markers here", &only), Some(EngineId::from("passive")));
    }

    #[test]
    fn test_conjunction_rule() {
        assert_eq!(pick("She left early because she was tired"), "conjunction");
        assert_eq!(pick("He stayed even though it rained"), "conjunction");
    }

    #[test]
    fn test_subjunctive_needs_two_markers() {
        assert_eq!(pick("If I were rich I would travel"), "subjunctive");
        assert_eq!(pick("If it rains we stay"), "basic");
    }

    #[test]
    fn test_passive_rule() {
        assert_eq!(pick("The cake was eaten by the children"), "passive");
        assert_eq!(pick("The house nearby was sold"), "basic");
    }

    #[test]
    fn test_inversion_rule_beats_priority() {
        assert_eq!(pick("Never have I seen such a beautiful sunset."), "inversion");
        assert_eq!(pick("Not only did she win, she set a record"), "inversion");
        assert_eq!(pick("I have never seen it"), "basic");
    }

    #[test]
    fn test_rule_order() {
        // Both a subordinator and a passive marker: conjunction is checked first
        assert_eq!(pick("The letter was sent by mail because it was urgent"), "conjunction");
    }

    #[test]
    fn test_rules_ignore_absent_categories() {
        let without_inversion: Vec<Candidate> = all()
            .into_iter()
            .filter(|c| c.category != EngineCategory::Inversion)
            .collect();
        assert_eq!(
            select("Rarely does it snow", &without_inversion),
            Some(EngineId::from("basic"))
        );
    }
}
