//! Lenient JSON extraction from model replies.

use serde_json::Value;

/// Parse the first JSON object in a model reply, tolerating code fences or
/// stray prose around it.
pub(crate) fn object_in(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}
