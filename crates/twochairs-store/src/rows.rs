//! Typed column access that names the offending table and column on failure.

use std::str::FromStr;

use rusqlite::types::FromSql;
use rusqlite::Row;
use serde_json::Value;

use crate::error::StoreError;

pub(crate) struct Columns<'a, 'r> {
    row: &'a Row<'r>,
    table: &'static str,
}

impl<'a, 'r> Columns<'a, 'r> {
    pub(crate) fn new(row: &'a Row<'r>, table: &'static str) -> Self {
        Self { row, table }
    }

    fn corrupt(&self, column: &'static str, detail: String) -> StoreError {
        StoreError::CorruptRow {
            table: self.table,
            column,
            detail,
        }
    }

    pub(crate) fn get<T: FromSql>(&self, idx: usize, column: &'static str) -> Result<T, StoreError> {
        self.row
            .get(idx)
            .map_err(|e| self.corrupt(column, e.to_string()))
    }

    /// A TEXT column holding the `FromStr` form of `T`.
    pub(crate) fn parse<T: FromStr>(&self, idx: usize, column: &'static str) -> Result<T, StoreError> {
        let raw: String = self.get(idx, column)?;
        raw.parse()
            .map_err(|_| self.corrupt(column, format!("unexpected value {raw:?}")))
    }

    /// A TEXT column holding a JSON document.
    pub(crate) fn json(&self, idx: usize, column: &'static str) -> Result<Value, StoreError> {
        let raw: String = self.get(idx, column)?;
        serde_json::from_str(&raw).map_err(|e| self.corrupt(column, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use twochairs_core::roles::Role;

    fn read<T>(sql: &str, f: impl FnOnce(Columns<'_, '_>) -> T) -> T {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare(sql).unwrap();
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();
        f(Columns::new(row, "messages"))
    }

    #[test]
    fn typed_reads() {
        read("SELECT 7, NULL, 'monster', '{\"matched\":\"keyword\"}'", |cols| {
            assert_eq!(cols.get::<i64>(0, "id").unwrap(), 7);
            assert_eq!(cols.get::<Option<String>>(1, "user_id").unwrap(), None);
            assert_eq!(cols.parse::<Role>(2, "role").unwrap(), Role::Monster);
            assert_eq!(cols.json(3, "payload").unwrap()["matched"], "keyword");
        });
    }

    #[test]
    fn failures_name_the_column() {
        read("SELECT 'critic', 'not json', NULL", |cols| {
            let err = cols.parse::<Role>(0, "role").unwrap_err();
            assert!(matches!(
                err,
                StoreError::CorruptRow { table: "messages", column: "role", .. }
            ));
            assert!(err.to_string().contains("critic"));

            assert!(matches!(
                cols.json(1, "payload"),
                Err(StoreError::CorruptRow { column: "payload", .. })
            ));
            assert!(matches!(
                cols.get::<String>(2, "text"),
                Err(StoreError::CorruptRow { column: "text", .. })
            ));
        });
    }
}
