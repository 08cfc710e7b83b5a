//! # hive-db
//!
//! Persistence layer for the hive signaling service.
//! Manages the single SQLite database at `$HIVE_DATA_DIR/hive.db`.
//!
//! ## Schema
//!
//! - `peers`: one row per session ever seen; never deleted
//! - `files`: one row per content hash with at least one holder
//! - `holdings`: (peer, hash) declarations, unique per pair
//!
//! All timestamps are Unix epoch seconds. The schema version is stored in
//! `PRAGMA user_version`.
//!
//! Query functions take `&Connection`, so they run unchanged inside a
//! `rusqlite::Transaction` (which derefs to `Connection`).

pub mod migrations;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = migrations::STEPS.len() as u32;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open (creating if needed) the database file and migrate it.
pub fn open(path: &Path) -> Result<Connection> {
    init(Connection::open(path)?)
}

/// Fresh migrated database that lives only as long as the connection.
pub fn open_memory() -> Result<Connection> {
    init(Connection::open_in_memory()?)
}

fn init(conn: Connection) -> Result<Connection> {
    // journal_mode is ignored for in-memory databases
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    migrations::run(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma(conn: &Connection, name: &str) -> i64 {
        conn.pragma_query_value(None, name, |row| row.get(0))
            .unwrap_or_else(|e| panic!("pragma {name}: {e}"))
    }

    #[test]
    fn test_memory_db_is_migrated_with_foreign_keys() {
        let conn = open_memory().expect("open");
        assert_eq!(pragma(&conn, "user_version"), i64::from(SCHEMA_VERSION));
        assert_eq!(pragma(&conn, "foreign_keys"), 1);
    }

    #[test]
    fn test_open_file_persists() {
        let dir = std::env::temp_dir().join(format!("hive-db-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("hive.db");
        {
            let conn = open(&path).expect("open");
            queries::peers::upsert_active(&conn, "p1", "10.0.0.1", 100).expect("insert");
        }
        let conn = open(&path).expect("reopen");
        let row = queries::peers::get(&conn, "p1").expect("row survives reopen");
        assert!(row.active);
        drop(conn);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
