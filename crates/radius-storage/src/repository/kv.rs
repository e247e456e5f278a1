//! Key-value repository.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Repository for the `kv_store` table.
pub struct KvRepo;

impl KvRepo {
    /// Get a value.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value (insert or update).
    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Delete a value. Returns whether a row was removed.
    pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn set_and_get() {
        let conn = setup_db();
        KvRepo::set(&conn, "radius||settings||proxy", "sj").unwrap();
        assert_eq!(
            KvRepo::get(&conn, "radius||settings||proxy").unwrap(),
            Some("sj".to_string())
        );
    }

    #[test]
    fn set_overwrites() {
        let conn = setup_db();
        KvRepo::set(&conn, "k", "one").unwrap();
        KvRepo::set(&conn, "k", "two").unwrap();
        assert_eq!(KvRepo::get(&conn, "k").unwrap(), Some("two".to_string()));
    }

    #[test]
    fn get_missing() {
        let conn = setup_db();
        assert_eq!(KvRepo::get(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn delete_reports_removal() {
        let conn = setup_db();
        KvRepo::set(&conn, "k", "v").unwrap();
        assert!(KvRepo::delete(&conn, "k").unwrap());
        assert!(!KvRepo::delete(&conn, "k").unwrap());
    }
}
