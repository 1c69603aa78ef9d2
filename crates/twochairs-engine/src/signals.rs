//! Phrase-pattern detectors over a single message.

use std::sync::LazyLock;

use regex::RegexSet;

/// Self-harm and suicide phrases. Misses are expected; moderation backs
/// this layer up.
const CRISIS_PATTERNS: &[&str] = &[
    r"kill myself",
    r"suicide",
    r"end my life",
    r"want to die",
    r"don['’]?t want to live",
    r"hurt myself",
    r"self[-\s]?harm",
    r"cutting myself",
    r"overdose",
    r"jump off",
];

/// Absolutist, hopeless or self-deprecating phrasing.
const NEGATIVE_PATTERNS: &[&str] = &[
    r"\bi can['’]?t\b",
    r"\bi won['’]?t\b",
    r"\bnever\b",
    r"\bhopeless\b",
    r"\bworthless\b",
    r"\bfail(ed|ing)?\b",
    r"pointless|no point",
    r"stupid|useless",
    r"always mess",
    r"nothing works",
];

static CRISIS: LazyLock<RegexSet> = LazyLock::new(|| compile(CRISIS_PATTERNS));
static NEGATIVE: LazyLock<RegexSet> = LazyLock::new(|| compile(NEGATIVE_PATTERNS));

fn compile(patterns: &[&str]) -> RegexSet {
    let case_insensitive: Vec<String> = patterns.iter().map(|p| format!("(?i){p}")).collect();
    RegexSet::new(case_insensitive).expect("detector patterns are valid regexes")
}

/// True when the text contains a crisis phrase.
pub fn is_crisis(text: &str) -> bool {
    CRISIS.is_match(text)
}

/// True when the text reads as negative self-talk.
pub fn is_negative(text: &str) -> bool {
    NEGATIVE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crisis_phrases_match() {
        assert!(is_crisis("I want to kill myself"));
        assert!(is_crisis("I want to end my life"));
        assert!(is_crisis("thinking about SUICIDE a lot"));
        assert!(is_crisis("I don't want to live anymore"));
        assert!(is_crisis("I dont want to live"));
        assert!(is_crisis("I don’t want to live"));
        assert!(is_crisis("I keep thinking about self-harm"));
        assert!(is_crisis("self harm again"));
        assert!(is_crisis("selfharm"));
        assert!(is_crisis("I might overdose"));
    }

    #[test]
    fn ordinary_text_is_not_crisis() {
        assert!(!is_crisis("I had a long day"));
        assert!(!is_crisis("My manager criticised my report"));
        assert!(!is_crisis(""));
    }

    #[test]
    fn negative_phrases_match() {
        assert!(is_negative("I always fail"));
        assert!(is_negative("I'm worthless"));
        assert!(is_negative("nothing works for me"));
        assert!(is_negative("I can't do this"));
        assert!(is_negative("I cant do this"));
        assert!(is_negative("It's pointless"));
        assert!(is_negative("there's no point"));
        assert!(is_negative("I failed the exam"));
        assert!(is_negative("I will NEVER get it right"));
    }

    #[test]
    fn word_boundaries_respected() {
        assert!(!is_negative("I finished my run this morning"));
        assert!(!is_negative("the failsafe kicked in"));
        assert!(!is_negative("nevertheless I tried"));
    }

    #[test]
    fn deterministic() {
        let text = "I always mess things up";
        assert_eq!(is_negative(text), is_negative(text));
        assert!(is_negative(text));
    }
}
