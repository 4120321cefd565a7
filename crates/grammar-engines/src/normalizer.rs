//! Text normalization for grammar engines and fallback extraction.
//!
//! Case is preserved so extracted slots read like the input:
//! - Whitespace normalization
//! - Terminal punctuation removal

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Multiple whitespace pattern
    static ref MULTI_SPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Space before punctuation ("word ,")
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"\s+([,;:])").unwrap();

    /// Terminal punctuation run, including closing quotes
    static ref TERMINAL_PUNCT: Regex = Regex::new(r#"[.!?…"'”’]+$"#).unwrap();
}

/// Normalize a sentence for pattern matching.
pub fn normalize(text: &str) -> String {
    let result = MULTI_SPACE.replace_all(text.trim(), " ");
    let result = SPACE_BEFORE_PUNCT.replace_all(&result, "$1");
    TERMINAL_PUNCT.replace(&result, "").trim_end().to_string()
}

/// True for empty or whitespace-only input.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Byte offset of the first whole-word occurrence of `word` (case-insensitive).
pub fn find_word(text: &str, word: &str) -> Option<usize> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
    Regex::new(&pattern).ok()?.find(text).map(|m| m.start())
}
