//! Fallback extraction strategies
//!
//! Used by the controller once every engine it was allowed to try has
//! failed. Neither strategy touches an engine. Pattern extraction works on
//! the normalized sentence; the positional split works on the raw tokens.

use dispatch_core::{EngineCategory, SlotMap};
use grammar_engines::normalizer::{find_word, normalize};
use serde::Serialize;

pub const PATTERN_CONFIDENCE: f64 = 0.5;
pub const NAIVE_CONFIDENCE: f64 = 0.3;

/// Which step of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    HealthySweep,
    DegradedSweep,
    PatternExtraction,
    NaivePositional,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HealthySweep => "healthy_sweep",
            Self::DegradedSweep => "degraded_sweep",
            Self::PatternExtraction => "pattern_extraction",
            Self::NaivePositional => "naive_positional",
        }
    }
}

// Longer phrases first so "even though" wins over a shorter match at the same spot
const SUBORDINATORS: &[&str] = &[
    "even though",
    "because",
    "although",
    "whereas",
    "unless",
    "while",
    "since",
];
const RELATIVE_PRONOUNS: &[&str] = &["who", "whom", "whose", "which", "that"];
const BE_FORMS: &[&str] = &["was", "were", "been", "is", "are", "be"];
const NEGATIVE_OPENERS: &[&str] = &["not only", "never", "rarely", "seldom", "hardly", "scarcely"];

/// Earliest whole-word occurrence of any of `words`.
fn earliest<'w>(text: &str, words: &[&'w str]) -> Option<(usize, &'w str)> {
    words
        .iter()
        .filter_map(|w| find_word(text, w).map(|pos| (pos, *w)))
        .min_by_key(|(pos, _)| *pos)
}

/// First token as `S`, the rest of the clause as `V`.
fn subject_predicate(clause: &str) -> SlotMap {
    let clause = clause.trim().trim_end_matches(',').trim();
    let (subject, predicate) = clause.split_once(' ').unwrap_or((clause, ""));
    SlotMap::new().with("S", subject).with("V", predicate.trim())
}

fn conjunction(text: &str) -> Option<SlotMap> {
    let (pos, _) = earliest(text, SUBORDINATORS)?;
    if pos == 0 {
        let comma = text.find(',')?;
        let clause = text[..comma].trim();
        Some(subject_predicate(&text[comma + 1..]).with("M1", clause))
    } else {
        Some(subject_predicate(&text[..pos]).with("M1", text[pos..].trim()))
    }
}

fn relative_clause(text: &str) -> Option<SlotMap> {
    let (pos, _) = earliest(text, RELATIVE_PRONOUNS)?;
    if pos == 0 {
        return None;
    }
    Some(
        SlotMap::new()
            .with("S", text[..pos].trim())
            .with("C1", text[pos..].trim()),
    )
}

fn passive(text: &str) -> Option<SlotMap> {
    let by = find_word(text, "by")?;
    let left = text[..by].trim();
    let agent = text[by + "by".len()..].trim();
    let slots = match earliest(left, BE_FORMS) {
        Some((be, _)) if be > 0 => SlotMap::new()
            .with("S", left[..be].trim())
            .with("V", left[be..].trim()),
        _ => subject_predicate(left),
    };
    Some(slots.with("M1", agent))
}

fn subjunctive(text: &str) -> Option<SlotMap> {
    let pos = find_word(text, "if")?;
    if pos == 0 {
        let comma = text.find(',')?;
        Some(subject_predicate(&text[comma + 1..]).with("M1", text[..comma].trim()))
    } else {
        Some(subject_predicate(&text[..pos]).with("M1", text[pos..].trim()))
    }
}

fn inversion(text: &str) -> Option<SlotMap> {
    let opener = NEGATIVE_OPENERS
        .iter()
        .find(|o| find_word(text, o) == Some(0))?;
    let head = text.get(..opener.len())?;
    let mut rest = text[opener.len()..].split_whitespace();
    let aux = rest.next()?;
    let subject = rest.next().unwrap_or("");
    // The fronted auxiliary is kept with its verb
    let verb: Vec<&str> = std::iter::once(aux).chain(rest).collect();
    Some(
        SlotMap::new()
            .with("M1", head)
            .with("S", subject)
            .with("V", &verb.join(" ")),
    )
}

/// Category-keyed textual heuristics for the engine that failed last.
///
/// Returns `None` when the category has no heuristic or nothing was found.
pub fn pattern_extract(sentence: &str, category: EngineCategory) -> Option<SlotMap> {
    let text = normalize(sentence);
    let slots = match category {
        EngineCategory::Conjunction => conjunction(&text),
        EngineCategory::Subjunctive => subjunctive(&text),
        EngineCategory::Passive => passive(&text),
        EngineCategory::Inversion => inversion(&text),
        EngineCategory::RelativeClause => relative_clause(&text),
        EngineCategory::Other => None,
    }?;
    (!slots.is_empty()).then_some(slots)
}

/// Positional split on whitespace: first token `S`, second `V`, the rest
/// `O1`. Tokens are kept verbatim, punctuation included.
pub fn naive_extract(sentence: &str) -> Option<SlotMap> {
    let tokens: Vec<&str> = sentence.split_whitespace().collect();
    let (first, rest) = tokens.split_first()?;
    let mut slots = SlotMap::new().with("S", first);
    if let Some((second, rest)) = rest.split_first() {
        slots = slots.with("V", second).with("O1", &rest.join(" "));
    }
    Some(slots)
}
