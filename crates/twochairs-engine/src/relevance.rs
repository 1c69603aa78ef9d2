//! Keyword-overlap test deciding whether a stored summary is recalled.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "if", "in", "into", "is", "it", "its", "of", "on", "or", "so", "that", "the", "their", "them",
    "there", "they", "this", "to", "was", "we", "what", "when", "where", "which", "who", "why",
    "will", "with", "you", "your",
];

const MIN_KEYWORD_LEN: usize = 3;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("word pattern is a valid regex"));

/// Lowercase alphanumeric words of three or more characters, minus stop words.
pub fn keywords(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    WORD.find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| w.len() >= MIN_KEYWORD_LEN && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// True when `summary` is non-empty and shares at least `min_overlap`
/// keywords with the current round.
pub fn is_relevant(current_round: &str, summary: &str, min_overlap: usize) -> bool {
    if summary.trim().is_empty() {
        return false;
    }
    let summary_words = keywords(summary);
    keywords(current_round)
        .intersection(&summary_words)
        .count()
        >= min_overlap
}
