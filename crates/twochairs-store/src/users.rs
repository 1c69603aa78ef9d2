use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use twochairs_core::ids::UserId;

use crate::database::Database;
use crate::error::StoreError;
use crate::rows::Columns;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: UserId,
    pub display_name: Option<String>,
    pub trusted_contact: Option<String>,
    pub user_summary: String,
    pub created_at: String,
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, trusted_contact))]
    pub fn create(
        &self,
        display_name: Option<&str>,
        trusted_contact: Option<&str>,
    ) -> Result<UserRow, StoreError> {
        let id = UserId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, trusted_contact, user_summary, created_at)
                 VALUES (?1, ?2, ?3, '', ?4)",
                rusqlite::params![id.as_str(), display_name, trusted_contact, now],
            )?;

            Ok(UserRow {
                id,
                display_name: display_name.map(str::to_string),
                trusted_contact: trusted_contact.map(str::to_string),
                user_summary: String::new(),
                created_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, display_name, trusted_contact, user_summary, created_at
                 FROM users WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::not_found("user", id)),
            }
        })
    }

    pub fn exists(&self, id: &UserId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Replace the cross-session rolling summary.
    #[instrument(skip(self, summary), fields(user_id = %id, len = summary.len()))]
    pub fn update_summary(&self, id: &UserId, summary: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET user_summary = ?1 WHERE id = ?2",
                rusqlite::params![summary, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("user", id));
            }
            Ok(())
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    let cols = Columns::new(row, "users");
    Ok(UserRow {
        id: UserId::from_raw(cols.get::<String>(0, "id")?),
        display_name: cols.get(1, "display_name")?,
        trusted_contact: cols.get(2, "trusted_contact")?,
        user_summary: cols.get(3, "user_summary")?,
        created_at: cols.get(4, "created_at")?,
    })
}
