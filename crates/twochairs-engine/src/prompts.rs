//! Prompt text sent to the language model.

use twochairs_core::roles::Role;
use twochairs_store::messages::MessageRow;

use crate::cycle::Round;

pub const REPLY_TEMPERATURE: f64 = 0.3;
pub const SUMMARY_TEMPERATURE: f64 = 0.2;
pub const SUGGESTION_TEMPERATURE: f64 = 0.2;

/// Character cap on the round context given to the suggestion prompt.
pub const SUGGESTION_CONTEXT_LIMIT: usize = 1600;

pub const JSON_ONLY_SYSTEM_PROMPT: &str = "Return only valid JSON. No preface.";

pub const ANGEL_SYSTEM_PROMPT: &str = r#"You are the Angel voice in a Two Chairs wellness exercise.

The user writes alternately as Self and as Monster (their inner critic). After three Self entries and three Monster entries you give one integrated reply.

Boundaries:
- Wellness support only. No diagnosis, no treatment claims, no promises of safety.

Style:
- Validate, then gently challenge, then reframe, then offer one small step.
- Warm, calm and plain. Short paragraphs. Not a yes-man.

Zero-echo:
- Never repeat the Monster's wording. Refer to it indirectly, for example "that harsh thought" or "that fear".

Personalisation:
- Earlier context may be supplied. Use it briefly when it helps; never recite it.

Output:
- Two to four short paragraphs ending with one specific next step."#;

/// Numbered transcript lines in stored order, e.g. `SELF 1: ...`.
fn transcript_lines(round: &Round, separator: &str) -> Vec<String> {
    let mut self_n = 0;
    let mut monster_n = 0;
    round
        .turns()
        .iter()
        .map(|turn| match turn.role {
            Role::Monster => {
                monster_n += 1;
                format!("MONSTER{separator}{monster_n}: {}", turn.text)
            }
            _ => {
                self_n += 1;
                format!("SELF{separator}{self_n}: {}", turn.text)
            }
        })
        .collect()
}

/// The structured exercise block closing every reply prompt.
pub fn two_chairs_block(round: &Round) -> String {
    let entries: Vec<String> = transcript_lines(round, " ")
        .into_iter()
        .map(|line| format!("• {line}"))
        .collect();

    format!(
        "We ran a Two Chairs exercise. Here are the entries:\n\n{}\n\n\
         Now respond as the Angel. Follow your rules and the zero-echo rule:\n\
         - Do not repeat the Monster's wording; refer to it indirectly as \"that harsh thought\" or \"that fear\".\n\
         - Validate briefly.\n\
         - Gently challenge at least one thought.\n\
         - Reframe with a more helpful perspective.\n\
         - Offer one small, doable next step they can try today.\n\
         Keep it warm and compact, around 180 to 230 words, with at most one or two short questions.",
        entries.join("\n")
    )
}

/// Full user prompt for the integrated reply. Summaries are included only
/// when the caller decided they are relevant.
pub fn compose_reply_prompt(
    user_summary: Option<&str>,
    session_summary: Option<&str>,
    round: &Round,
) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(summary) = user_summary.filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Long-term context (previous sessions):\n{summary}"));
    }
    if let Some(summary) = session_summary.filter(|s| !s.trim().is_empty()) {
        parts.push(format!("This-session context so far:\n{summary}"));
    }
    parts.push(two_chairs_block(round));
    parts.join("\n\n")
}

pub fn session_summary_prompt(history: &[MessageRow]) -> String {
    let lines: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.text))
        .collect();

    format!(
        "Summarize the earlier conversation in 5 to 8 concise bullets. \
         Be concrete; capture themes, triggers, and helpful actions. \
         Avoid quoting harsh 'Monster' lines verbatim. \
         Keep to about 250 to 300 tokens.\n\n{}",
        lines.join("\n")
    )
}

pub fn user_summary_prompt(previous: &str, session_summary: &str) -> String {
    let previous = if previous.trim().is_empty() {
        "(none yet)"
    } else {
        previous
    };
    format!(
        "Maintain long-term notes about this person across sessions. \
         Merge the existing notes with the latest session summary into 5 to 8 concise bullets. \
         Keep recurring themes, strengths, and steps that helped; drop one-off details. \
         Do not quote harsh 'Monster' lines.\n\n\
         Existing notes:\n{previous}\n\nLatest session summary:\n{session_summary}"
    )
}

pub fn tone_prompt(texts: &[String]) -> String {
    let numbered: Vec<String> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("#{}: {}", i + 1, serde_json::Value::String(t.clone())))
        .collect();

    format!(
        "Return JSON only: {{\"labels\":[booleans matching each input as negative or not]}}.\n\
         Mark \"negative\" when there is self-judgment, hopelessness about self, global negative \
         self-evaluation, or strongly pessimistic outlook.\n\n{}",
        numbered.join("\n")
    )
}

/// Truncate to `limit` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn suggestion_prompt(round: &Round) -> String {
    let context = truncate_chars(&transcript_lines(round, "").join(" | "), SUGGESTION_CONTEXT_LIMIT);
    let last_self = round.self_texts().pop().unwrap_or_default();
    let last_monster = round.monster_texts().pop().unwrap_or_default();

    format!(
        "Return JSON only: {{\"suggestions\":[\"...\",\"...\",\"...\",\"...\"]}}\n\n\
         You are a supportive coach in a Two Chairs exercise (Self vs Monster).\n\
         Write 4 first-person reply ideas the user (SELF) could try next, using the full context below.\n\n\
         FULL CONTEXT (ordered):\n{context}\n\n\
         Most recent SELF: {last_self:?}\n\
         Most recent MONSTER: {last_monster:?}\n\n\
         Rules:\n\
         - Zero-echo: don't repeat the critic's harsh labels; refer indirectly (e.g. \"that harsh thought\").\n\
         - 6 to 14 words each. Start every line with \"I \".\n\
         - Provide this spread:\n  \
           1) gently name or validate the feeling,\n  \
           2) recall a strength, value or prior effort from the context,\n  \
           3) propose one tiny next step the user can actually do soon,\n  \
           4) offer a kinder reframe of the situation.\n\
         - Context-specific, natural phrasing. No clinical claims. No toxic positivity. No questions."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use twochairs_core::ids::SessionId;

    fn round(entries: &[(Role, &str)]) -> Round {
        let sid = SessionId::from_raw("sess_p");
        let log: Vec<MessageRow> = entries
            .iter()
            .enumerate()
            .map(|(i, (role, text))| MessageRow {
                id: i as i64,
                session_id: sid.clone(),
                role: *role,
                text: text.to_string(),
                created_at: String::new(),
            })
            .collect();
        Round::current(&log)
    }

    #[test]
    fn block_numbers_each_role() {
        let r = round(&[(Role::Self_, "tired"), (Role::Monster, "lazy"), (Role::Self_, "trying")]);
        let block = two_chairs_block(&r);
        assert!(block.contains("• SELF 1: tired"));
        assert!(block.contains("• MONSTER 1: lazy"));
        assert!(block.contains("• SELF 2: trying"));
        assert!(block.find("SELF 1").unwrap() < block.find("MONSTER 1").unwrap());
    }

    #[test]
    fn compose_orders_blocks() {
        let r = round(&[(Role::Self_, "work")]);
        let prompt = compose_reply_prompt(Some("user notes"), Some("session notes"), &r);
        let user_at = prompt.find("Long-term context").unwrap();
        let session_at = prompt.find("This-session context").unwrap();
        let block_at = prompt.find("We ran a Two Chairs exercise").unwrap();
        assert!(user_at < session_at && session_at < block_at);
    }

    #[test]
    fn compose_skips_missing_summaries() {
        let r = round(&[(Role::Self_, "work")]);
        let prompt = compose_reply_prompt(None, Some(""), &r);
        assert!(!prompt.contains("Long-term context"));
        assert!(!prompt.contains("This-session context"));
        assert!(prompt.starts_with("We ran a Two Chairs exercise"));
    }

    #[test]
    fn summary_prompt_labels_roles() {
        let sid = SessionId::from_raw("sess_p");
        let history = vec![MessageRow {
            id: 1,
            session_id: sid,
            role: Role::Angel,
            text: "be kind".into(),
            created_at: String::new(),
        }];
        assert!(session_summary_prompt(&history).ends_with("ANGEL: be kind"));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("short", 10), "short");
        let cut = truncate_chars("ééééééé", 4);
        assert_eq!(cut.chars().count(), 4);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn suggestion_context_is_capped() {
        let long = "x".repeat(3000);
        let r = round(&[(Role::Self_, long.as_str()), (Role::Monster, "m")]);
        let prompt = suggestion_prompt(&r);
        assert!(prompt.contains("SELF1: "));
        assert!(prompt.contains('…'));
        assert!(!prompt.contains("MONSTER1: m"));
    }

    #[test]
    fn tone_prompt_quotes_inputs() {
        let prompt = tone_prompt(&["say \"hi\"".to_string()]);
        assert!(prompt.contains(r#"#1: "say \"hi\"""#));
    }
}
