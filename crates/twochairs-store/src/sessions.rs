use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

use twochairs_core::ids::{SessionId, UserId};
use twochairs_core::roles::Role;

use crate::alerts::{insert_alert, AlertKind, AlertRow};
use crate::database::Database;
use crate::error::StoreError;
use crate::messages::{insert_message, MessageRow};
use crate::rows::Columns;

/// Session lifecycle. `Crisis` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Crisis,
}

impl SessionStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Crisis)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Crisis => write!(f, "crisis"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "crisis" => Ok(Self::Crisis),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: SessionId,
    pub user_id: Option<UserId>,
    pub mode: String,
    pub status: SessionStatus,
    pub summary: String,
    pub started_at: String,
}

/// Everything written by a crisis transition.
#[derive(Clone, Debug)]
pub struct CrisisLatch {
    pub message: MessageRow,
    pub alert: AlertRow,
}

pub struct SessionRepo {
    db: Database,
}

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(mode))]
    pub fn create(&self, user_id: Option<&UserId>, mode: &str) -> Result<SessionRow, StoreError> {
        let id = SessionId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, mode, status, summary, started_at)
                 VALUES (?1, ?2, ?3, 'active', '', ?4)",
                rusqlite::params![id.as_str(), user_id.map(UserId::as_str), mode, now],
            )?;

            Ok(SessionRow {
                id,
                user_id: user_id.cloned(),
                mode: mode.to_string(),
                status: SessionStatus::Active,
                summary: String::new(),
                started_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn get(&self, id: &SessionId) -> Result<SessionRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, mode, status, summary, started_at
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(StoreError::not_found("session", id)),
            }
        })
    }

    /// Replace the rolling session summary.
    #[instrument(skip(self, summary), fields(session_id = %id, len = summary.len()))]
    pub fn update_summary(&self, id: &SessionId, summary: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sessions SET summary = ?1 WHERE id = ?2",
                rusqlite::params![summary, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("session", id));
            }
            Ok(())
        })
    }

    /// Persist the triggering message, record a crisis alert and latch the
    /// session status in one transaction. The status never moves back.
    #[instrument(skip(self, text, payload), fields(session_id = %id, role = %role))]
    pub fn latch_crisis(
        &self,
        id: &SessionId,
        role: Role,
        text: &str,
        payload: &Value,
    ) -> Result<CrisisLatch, StoreError> {
        self.db.with_tx(|tx| {
            let message = insert_message(tx, id, role, text)?;
            let alert = insert_alert(tx, id, AlertKind::Crisis, payload)?;
            let changed = tx.execute(
                "UPDATE sessions SET status = 'crisis' WHERE id = ?1",
                [id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("session", id));
            }
            warn!(session_id = %id, "session latched to crisis");
            Ok(CrisisLatch { message, alert })
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRow, StoreError> {
    let cols = Columns::new(row, "sessions");
    Ok(SessionRow {
        id: SessionId::from_raw(cols.get::<String>(0, "id")?),
        user_id: cols.get::<Option<String>>(1, "user_id")?.map(UserId::from_raw),
        mode: cols.get(2, "mode")?,
        status: cols.parse(3, "status")?,
        summary: cols.get(4, "summary")?,
        started_at: cols.get(5, "started_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertRepo;
    use crate::messages::MessageRepo;
    use crate::users::UserRepo;
    use serde_json::json;

    #[test]
    fn create_session_defaults() {
        let repo = SessionRepo::new(Database::in_memory().unwrap());
        let session = repo.create(None, "two-chairs").unwrap();
        assert!(session.id.as_str().starts_with("sess_"));
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.summary.is_empty());
        assert!(session.user_id.is_none());
    }

    #[test]
    fn session_with_user() {
        let db = Database::in_memory().unwrap();
        let user = UserRepo::new(db.clone()).create(Some("Ana"), None).unwrap();
        let repo = SessionRepo::new(db);
        let session = repo.create(Some(&user.id), "two-chairs").unwrap();

        let fetched = repo.get(&session.id).unwrap();
        assert_eq!(fetched.user_id, Some(user.id));
        assert_eq!(fetched.mode, "two-chairs");
    }

    #[test]
    fn unknown_user_rejected() {
        let repo = SessionRepo::new(Database::in_memory().unwrap());
        let result = repo.create(Some(&UserId::from_raw("user_missing")), "two-chairs");
        assert!(result.is_err());
    }

    #[test]
    fn get_nonexistent_fails() {
        let repo = SessionRepo::new(Database::in_memory().unwrap());
        let err = repo.get(&SessionId::from_raw("sess_nonexistent")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn update_summary_persists() {
        let repo = SessionRepo::new(Database::in_memory().unwrap());
        let session = repo.create(None, "two-chairs").unwrap();
        repo.update_summary(&session.id, "- deadline stress at work").unwrap();
        assert_eq!(repo.get(&session.id).unwrap().summary, "- deadline stress at work");
    }

    #[test]
    fn latch_crisis_writes_everything() {
        let db = Database::in_memory().unwrap();
        let repo = SessionRepo::new(db.clone());
        let session = repo.create(None, "two-chairs").unwrap();

        let latch = repo
            .latch_crisis(&session.id, Role::Self_, "I want to end my life", &json!({"matched": "keyword"}))
            .unwrap();
        assert_eq!(latch.alert.kind, AlertKind::Crisis);
        assert_eq!(latch.message.text, "I want to end my life");

        assert!(repo.get(&session.id).unwrap().status.is_locked());
        assert_eq!(MessageRepo::new(db.clone()).list_for_session(&session.id).unwrap().len(), 1);
        let alerts = AlertRepo::new(db).list_for_session(&session.id).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].payload["matched"], "keyword");
    }

    #[test]
    fn latch_on_missing_session_leaves_no_rows() {
        let db = Database::in_memory().unwrap();
        let repo = SessionRepo::new(db.clone());
        let ghost = SessionId::from_raw("sess_ghost");
        assert!(repo.latch_crisis(&ghost, Role::Self_, "x", &json!({})).is_err());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn status_parse() {
        assert_eq!("crisis".parse::<SessionStatus>().unwrap(), SessionStatus::Crisis);
        assert!("archived".parse::<SessionStatus>().is_err());
    }
}
