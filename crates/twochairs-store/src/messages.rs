use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use twochairs_core::ids::SessionId;
use twochairs_core::roles::Role;

use crate::database::Database;
use crate::error::StoreError;
use crate::rows::Columns;

/// One entry of a session's append-only log. `id` is the ordering key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: i64,
    pub session_id: SessionId,
    pub role: Role,
    pub text: String,
    pub created_at: String,
}

pub struct MessageRepo {
    db: Database,
}

impl MessageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, text), fields(session_id = %session_id, role = %role))]
    pub fn append(
        &self,
        session_id: &SessionId,
        role: Role,
        text: &str,
    ) -> Result<MessageRow, StoreError> {
        self.db.with_conn(|conn| insert_message(conn, session_id, role, text))
    }

    /// All messages of a session in stored order.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<MessageRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, text, created_at
                 FROM messages WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([session_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }
}

/// Connection-level insert, shared with the crisis latch transaction.
pub(crate) fn insert_message(
    conn: &Connection,
    session_id: &SessionId,
    role: Role,
    text: &str,
) -> Result<MessageRow, StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO messages (session_id, role, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![session_id.as_str(), role.as_str(), text, now],
    )?;

    Ok(MessageRow {
        id: conn.last_insert_rowid(),
        session_id: session_id.clone(),
        role,
        text: text.to_string(),
        created_at: now,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<MessageRow, StoreError> {
    let cols = Columns::new(row, "messages");
    Ok(MessageRow {
        id: cols.get(0, "id")?,
        session_id: SessionId::from_raw(cols.get::<String>(1, "session_id")?),
        role: cols.parse(2, "role")?,
        text: cols.get(3, "text")?,
        created_at: cols.get(4, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionRepo;

    fn setup() -> (Database, SessionId) {
        let db = Database::in_memory().unwrap();
        let session = SessionRepo::new(db.clone()).create(None, "two-chairs").unwrap();
        (db, session.id)
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let (db, sid) = setup();
        let repo = MessageRepo::new(db);
        let a = repo.append(&sid, Role::Self_, "first").unwrap();
        let b = repo.append(&sid, Role::Monster, "second").unwrap();
        assert!(b.id > a.id);
        assert_eq!(a.role, Role::Self_);
    }

    #[test]
    fn list_preserves_order_and_roles() {
        let (db, sid) = setup();
        let repo = MessageRepo::new(db);
        repo.append(&sid, Role::Monster, "m1").unwrap();
        repo.append(&sid, Role::Self_, "s1").unwrap();
        repo.append(&sid, Role::Angel, "a1").unwrap();

        let all = repo.list_for_session(&sid).unwrap();
        let texts: Vec<_> = all.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m1", "s1", "a1"]);
        assert_eq!(all[2].role, Role::Angel);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn sessions_are_isolated() {
        let db = Database::in_memory().unwrap();
        let sessions = SessionRepo::new(db.clone());
        let s1 = sessions.create(None, "two-chairs").unwrap();
        let s2 = sessions.create(None, "two-chairs").unwrap();
        let repo = MessageRepo::new(db);
        repo.append(&s1.id, Role::Self_, "one").unwrap();
        repo.append(&s2.id, Role::Self_, "two").unwrap();
        repo.append(&s2.id, Role::Monster, "three").unwrap();

        assert_eq!(repo.list_for_session(&s1.id).unwrap().len(), 1);
        assert_eq!(repo.list_for_session(&s2.id).unwrap().len(), 2);
    }

    #[test]
    fn unknown_session_rejected_by_foreign_key() {
        let repo = MessageRepo::new(Database::in_memory().unwrap());
        let result = repo.append(&SessionId::from_raw("sess_missing"), Role::Self_, "hi");
        assert!(result.is_err());
    }

    #[test]
    fn empty_session_lists_nothing() {
        let (db, sid) = setup();
        let repo = MessageRepo::new(db);
        assert!(repo.list_for_session(&sid).unwrap().is_empty());
    }
}
