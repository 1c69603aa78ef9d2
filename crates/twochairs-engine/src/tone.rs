//! Negativity labels for the self turns of a completed round.

use serde_json::Value;
use tracing::warn;

use twochairs_core::provider::{GenerateOptions, LanguageModel};

use crate::json;
use crate::prompts;
use crate::signals;

pub fn classify_negatives_local(texts: &[String]) -> Vec<bool> {
    texts.iter().map(|t| signals::is_negative(t)).collect()
}

/// Ask the model for one boolean per text. Any failure, malformed reply or
/// count mismatch falls back to the local patterns.
pub async fn classify_negatives(
    model: &dyn LanguageModel,
    session_id: &str,
    texts: &[String],
) -> Vec<bool> {
    let prompt = prompts::tone_prompt(texts);
    let raw = match model
        .generate(prompts::JSON_ONLY_SYSTEM_PROMPT, &prompt, &GenerateOptions::default())
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "tone model failed, using local patterns");
            return classify_negatives_local(texts);
        }
    };

    match parse_labels(&raw, texts.len()) {
        Some(labels) => labels,
        None => {
            warn!(session_id = %session_id, "unusable tone labels, using local patterns");
            classify_negatives_local(texts)
        }
    }
}

fn parse_labels(raw: &str, expected: usize) -> Option<Vec<bool>> {
    let value = json::object_in(raw)?;
    let labels: Vec<bool> = value
        .get("labels")?
        .as_array()?
        .iter()
        .map(Value::as_bool)
        .collect::<Option<_>>()?;
    (labels.len() == expected).then_some(labels)
}
