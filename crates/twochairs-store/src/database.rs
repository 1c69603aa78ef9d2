use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::schema;

const MEMORY_PATH: &str = ":memory:";

struct Shared {
    conn: Mutex<Connection>,
    path: PathBuf,
}

/// Handle to the SQLite store. Clones share one connection; callers are
/// serialized on it, and the async side reaches it only through the
/// repositories' short synchronous calls.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    /// Open the file at `path`, creating parent directories, tables and
    /// indexes as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let db = Self::prepare(Connection::open(path)?, path.to_path_buf())?;
        info!(path = %path.display(), "database ready");
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::prepare(Connection::open_in_memory()?, PathBuf::from(MEMORY_PATH))
    }

    fn prepare(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(schema::PRAGMAS)?;
        migrate(&conn)?;
        Ok(Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(conn),
                path,
            }),
        })
    }

    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        f(&self.shared.conn.lock())
    }

    /// Run `f` in a transaction; an `Err` from `f` rolls everything back.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.shared.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

/// Bring the schema to [`schema::SCHEMA_VERSION`], tracked in `user_version`.
fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let found: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > schema::SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: schema::SCHEMA_VERSION,
        });
    }
    if found < schema::SCHEMA_VERSION {
        conn.execute_batch(schema::CREATE_TABLES)?;
        conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
        debug!(from = found, to = schema::SCHEMA_VERSION, "schema migrated");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn fresh_database_has_all_tables() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.path(), Path::new(MEMORY_PATH));
        for table in ["users", "sessions", "messages", "alerts"] {
            let sql = format!("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{table}'");
            assert_eq!(count(&db, &sql), 1, "missing {table}");
        }
        assert_eq!(count(&db, "PRAGMA user_version"), i64::from(schema::SCHEMA_VERSION));
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("twochairs.db");

        let first = Database::open(&path).unwrap();
        first
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO users (id, created_at) VALUES ('user_keep', '2026-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        drop(first);

        let second = Database::open(&path).unwrap();
        assert_eq!(count(&second, "SELECT COUNT(*) FROM users"), 1);
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION + 1)
                .unwrap();
        }
        assert!(matches!(
            Database::open(&path),
            Err(StoreError::SchemaTooNew { .. })
        ));
    }

    #[test]
    fn failed_transaction_leaves_nothing() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), StoreError> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (id, created_at) VALUES ('user_tx', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Err(StoreError::not_found("session", "sess_gone"))
        });
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users"), 0);
    }

    #[test]
    fn clones_share_the_connection() {
        let db = Database::in_memory().unwrap();
        let other = db.clone();
        other
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO users (id, created_at) VALUES ('user_shared', '2026-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users"), 1);
    }
}
