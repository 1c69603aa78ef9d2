//! Next-turn suggestions for the Self chair.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use twochairs_core::provider::{GenerateOptions, LanguageModel};

use crate::cycle::Round;
use crate::json;
use crate::prompts;

pub const SUGGESTION_COUNT: usize = 4;
const MIN_WORDS: usize = 6;
const MAX_WORDS: usize = 14;

/// Neutral suggestions used to pad or replace model output.
pub const FALLBACK_SUGGESTIONS: [&str; SUGGESTION_COUNT] = [
    "I notice what I'm feeling, and it makes sense right now.",
    "I can recognise my effort and let that count for something.",
    "I will take one small step next, then give myself a short break.",
    "I am learning to speak to myself with a kinder voice.",
];

pub fn fallback_suggestions() -> Vec<String> {
    FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Starts with "I " and has 6 to 14 words.
pub fn is_acceptable(candidate: &str) -> bool {
    let words = candidate.split_whitespace().count();
    candidate.starts_with("I ") && (MIN_WORDS..=MAX_WORDS).contains(&words)
}

/// Keep acceptable candidates, drop duplicates, then pad with fallbacks to
/// exactly [`SUGGESTION_COUNT`].
pub fn finalize(candidates: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(SUGGESTION_COUNT);
    for candidate in candidates {
        let candidate = candidate.trim().to_string();
        if is_acceptable(&candidate) && !out.contains(&candidate) {
            out.push(candidate);
        }
        if out.len() == SUGGESTION_COUNT {
            return out;
        }
    }

    for fallback in FALLBACK_SUGGESTIONS {
        if out.len() == SUGGESTION_COUNT {
            break;
        }
        if !out.iter().any(|s| s == fallback) {
            out.push(fallback.to_string());
        }
    }
    out
}

/// String entries of `{"suggestions": [...]}`, or `None` when the reply is
/// not shaped that way.
fn parse_candidates(raw: &str) -> Option<Vec<String>> {
    let value = json::object_in(raw)?;
    let list = value.get("suggestions")?.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

/// Asks the language model for suggestions personalised to the round so far.
/// Always yields exactly four strings and never waits past its timeout.
pub struct SuggestionGenerator {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl SuggestionGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub async fn suggest_next_self_turns(&self, session_id: &str, round: &Round) -> Vec<String> {
        let prompt = prompts::suggestion_prompt(round);
        let options = GenerateOptions::with_temperature(prompts::SUGGESTION_TEMPERATURE);

        let call = self
            .model
            .generate(prompts::JSON_ONLY_SYSTEM_PROMPT, &prompt, &options);

        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "suggestion generation failed, using fallback");
                return fallback_suggestions();
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "suggestion generation timed out, using fallback"
                );
                return fallback_suggestions();
            }
        };

        match parse_candidates(&raw) {
            Some(candidates) => {
                let total = candidates.len();
                let out = finalize(candidates);
                debug!(session_id = %session_id, candidates = total, "suggestions generated");
                out
            }
            None => {
                warn!(session_id = %session_id, "malformed suggestion response, using fallback");
                fallback_suggestions()
            }
        }
    }
}
