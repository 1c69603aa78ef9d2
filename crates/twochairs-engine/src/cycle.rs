//! Round reconstruction from a session's message log.
//!
//! A round is the suffix of the log after the most recent angel message.
//! Nothing about the round is persisted; it is replayed from the log on
//! every request.

use twochairs_core::roles::Role;
use twochairs_store::messages::MessageRow;

/// Messages in a complete round.
pub const ROUND_SIZE: usize = 6;

/// One user turn inside a round, in stored order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Round {
    turns: Vec<Turn>,
}

impl Round {
    /// Rebuild the in-progress round from an ordered log.
    pub fn current(log: &[MessageRow]) -> Self {
        let start = log
            .iter()
            .rposition(|m| m.role == Role::Angel)
            .map_or(0, |idx| idx + 1);

        let turns = log[start..]
            .iter()
            .filter(|m| m.role.is_user_role())
            .map(|m| Turn {
                role: m.role,
                text: m.text.clone(),
            })
            .collect();

        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Self texts in stored order.
    pub fn self_texts(&self) -> Vec<String> {
        self.texts_for(Role::Self_)
    }

    /// Monster texts in stored order.
    pub fn monster_texts(&self) -> Vec<String> {
        self.texts_for(Role::Monster)
    }

    fn texts_for(&self, role: Role) -> Vec<String> {
        self.turns
            .iter()
            .filter(|t| t.role == role)
            .map(|t| t.text.clone())
            .collect()
    }

    pub fn self_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::Self_).count()
    }

    pub fn monster_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::Monster).count()
    }

    pub fn total(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Completeness depends only on the count, never on interleaving.
    pub fn is_complete(&self) -> bool {
        self.total() == ROUND_SIZE
    }

    /// Messages still missing before the round completes.
    pub fn remaining(&self) -> usize {
        ROUND_SIZE.saturating_sub(self.total())
    }

    /// True when the last turn was a monster turn that evened the counts,
    /// so the user writes as Self next.
    pub fn awaits_self_reply(&self) -> bool {
        let monsters = self.monster_count();
        !self.is_complete()
            && self.turns.last().is_some_and(|t| t.role == Role::Monster)
            && monsters >= 1
            && self.self_count() == monsters
    }

    /// All round texts joined by spaces, self texts first.
    pub fn joined_text(&self) -> String {
        let mut parts = self.self_texts();
        parts.extend(self.monster_texts());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twochairs_core::ids::SessionId;

    fn log(entries: &[(Role, &str)]) -> Vec<MessageRow> {
        let sid = SessionId::from_raw("sess_test");
        entries
            .iter()
            .enumerate()
            .map(|(i, (role, text))| MessageRow {
                id: i as i64 + 1,
                session_id: sid.clone(),
                role: *role,
                text: text.to_string(),
                created_at: "2026-01-01T00:00:00Z".into(),
            })
            .collect()
    }

    use Role::{Angel, Monster, Self_};

    #[test]
    fn empty_log_is_empty_round() {
        let round = Round::current(&[]);
        assert!(round.is_empty());
        assert!(!round.is_complete());
        assert_eq!(round.remaining(), 6);
    }

    #[test]
    fn partitions_by_role_preserving_order() {
        let round = Round::current(&log(&[(Self_, "s1"), (Monster, "m1"), (Self_, "s2")]));
        assert_eq!(round.self_texts(), vec!["s1", "s2"]);
        assert_eq!(round.monster_texts(), vec!["m1"]);
        assert_eq!(round.total(), 3);
        assert_eq!(round.remaining(), 3);
    }

    #[test]
    fn suffix_after_last_angel() {
        let round = Round::current(&log(&[
            (Self_, "old s"),
            (Monster, "old m"),
            (Angel, "reply one"),
            (Self_, "s1"),
            (Angel, "reply two"),
            (Monster, "m1"),
        ]));
        assert_eq!(round.self_texts(), Vec::<String>::new());
        assert_eq!(round.monster_texts(), vec!["m1"]);
    }

    #[test]
    fn log_ending_in_angel_is_empty_round() {
        let round = Round::current(&log(&[
            (Self_, "s1"),
            (Monster, "m1"),
            (Angel, "reply"),
        ]));
        assert!(round.is_empty());
    }

    #[test]
    fn completeness_ignores_interleaving() {
        let blocked = Round::current(&log(&[
            (Self_, "s1"),
            (Self_, "s2"),
            (Self_, "s3"),
            (Monster, "m1"),
            (Monster, "m2"),
            (Monster, "m3"),
        ]));
        let alternating = Round::current(&log(&[
            (Self_, "s1"),
            (Monster, "m1"),
            (Self_, "s2"),
            (Monster, "m2"),
            (Self_, "s3"),
            (Monster, "m3"),
        ]));
        assert!(blocked.is_complete());
        assert!(alternating.is_complete());
        assert_eq!(blocked.self_texts(), alternating.self_texts());
        assert_eq!(blocked.monster_texts(), alternating.monster_texts());
    }

    #[test]
    fn recomputation_is_stable() {
        let messages = log(&[(Self_, "s1"), (Monster, "m1"), (Angel, "a"), (Self_, "s2")]);
        let first = Round::current(&messages);
        for _ in 0..5 {
            assert_eq!(Round::current(&messages), first);
        }
    }

    #[test]
    fn awaits_self_after_balancing_monster_turn() {
        let round = Round::current(&log(&[(Self_, "s1"), (Monster, "m1")]));
        assert!(round.awaits_self_reply());

        let unbalanced = Round::current(&log(&[(Monster, "m1")]));
        assert!(!unbalanced.awaits_self_reply());

        let after_self = Round::current(&log(&[(Monster, "m1"), (Self_, "s1")]));
        assert!(!after_self.awaits_self_reply());
    }

    #[test]
    fn complete_round_never_awaits() {
        let round = Round::current(&log(&[
            (Self_, "s1"),
            (Monster, "m1"),
            (Self_, "s2"),
            (Monster, "m2"),
            (Self_, "s3"),
            (Monster, "m3"),
        ]));
        assert!(!round.awaits_self_reply());
        assert_eq!(round.remaining(), 0);
    }

    #[test]
    fn joined_text_lists_self_then_monster() {
        let round = Round::current(&log(&[(Monster, "m1"), (Self_, "s1")]));
        assert_eq!(round.joined_text(), "s1 m1");
    }
}
