use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use twochairs_core::ids::SessionId;

use crate::database::Database;
use crate::error::StoreError;
use crate::rows::Columns;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    Crisis,
    CycleNegative,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crisis => write!(f, "crisis"),
            Self::CycleNegative => write!(f, "cycle-negative"),
        }
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crisis" => Ok(Self::Crisis),
            "cycle-negative" => Ok(Self::CycleNegative),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

/// Write-once audit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRow {
    pub id: i64,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub payload: Value,
    pub created_at: String,
}

pub struct AlertRepo {
    db: Database,
}

impl AlertRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload), fields(session_id = %session_id, kind = %kind))]
    pub fn record(
        &self,
        session_id: &SessionId,
        kind: AlertKind,
        payload: &Value,
    ) -> Result<AlertRow, StoreError> {
        self.db.with_conn(|conn| insert_alert(conn, session_id, kind, payload))
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<AlertRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, type, payload, created_at
                 FROM alerts WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([session_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_alert(row)?);
            }
            Ok(results)
        })
    }
}

pub(crate) fn insert_alert(
    conn: &Connection,
    session_id: &SessionId,
    kind: AlertKind,
    payload: &Value,
) -> Result<AlertRow, StoreError> {
    let now = Utc::now().to_rfc3339();
    let payload_str = serde_json::to_string(payload)?;
    conn.execute(
        "INSERT INTO alerts (session_id, type, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![session_id.as_str(), kind.to_string(), payload_str, now],
    )?;

    Ok(AlertRow {
        id: conn.last_insert_rowid(),
        session_id: session_id.clone(),
        kind,
        payload: payload.clone(),
        created_at: now,
    })
}

fn row_to_alert(row: &rusqlite::Row<'_>) -> Result<AlertRow, StoreError> {
    let cols = Columns::new(row, "alerts");
    Ok(AlertRow {
        id: cols.get(0, "id")?,
        session_id: SessionId::from_raw(cols.get::<String>(1, "session_id")?),
        kind: cols.parse(2, "type")?,
        payload: cols.json(3, "payload")?,
        created_at: cols.get(4, "created_at")?,
    })
}
