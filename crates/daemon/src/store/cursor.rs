// meta table access: one current value per key, no history.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

pub struct CursorTable;

impl CursorTable {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .with_context(|| format!("failed to read meta key `{key}`"))
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO meta (key, value, updated_at) VALUES (?1, ?2, datetime('now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )
        .with_context(|| format!("failed to write meta key `{key}`"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::store::meta_db::MetaDb;

    #[test]
    fn missing_key_is_absent() {
        let dir = TempDir::new().unwrap();
        let db = MetaDb::open(dir.path().join("folio.db")).unwrap();
        assert_eq!(CursorTable::get(db.connection(), "origin").unwrap(), None);
    }

    #[test]
    fn set_overwrites_previous_value() {
        let dir = TempDir::new().unwrap();
        let db = MetaDb::open(dir.path().join("folio.db")).unwrap();

        CursorTable::set(db.connection(), "origin", "aaa111").unwrap();
        CursorTable::set(db.connection(), "origin", "bbb222").unwrap();

        assert_eq!(CursorTable::get(db.connection(), "origin").unwrap().as_deref(), Some("bbb222"));
        let rows: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
