//! SQLite schema for the dataset database.

use rusqlite::{Connection, OptionalExtension};

use crate::errors::{HarvestError, HarvestResult};

pub const SCHEMA_VERSION: i32 = 1;

/// Replayable DDL: every statement is `IF NOT EXISTS`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS dataset_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS methods (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_name TEXT NOT NULL,
        repo_url TEXT NOT NULL,
        commit_sha TEXT NOT NULL,
        file_path TEXT NOT NULL,
        method_name TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        signature TEXT NOT NULL,
        original_code TEXT NOT NULL,
        code_tokens TEXT NOT NULL,
        dedup_key TEXT NOT NULL UNIQUE,
        CHECK (start_line >= 1 AND end_line >= start_line)
    );",
    "CREATE INDEX IF NOT EXISTS idx_methods_repo ON methods(repo_name);",
    "CREATE INDEX IF NOT EXISTS idx_methods_file ON methods(repo_name, file_path);",
];

/// Create the schema and stamp its version. Refuses databases written by a
/// newer schema.
pub fn init_schema(conn: &Connection) -> HarvestResult<()> {
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    let current = get_meta(conn, "schema_version")?
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);
    if current > SCHEMA_VERSION {
        return Err(HarvestError::Config(format!(
            "dataset database has schema version {current}, newer than {SCHEMA_VERSION}"
        )));
    }
    set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())
}

pub fn get_meta(conn: &Connection, key: &str) -> HarvestResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM dataset_meta WHERE key = ?1;",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> HarvestResult<()> {
    conn.execute(
        "INSERT INTO dataset_meta(key, value) VALUES(?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![key, value],
    )?;
    Ok(())
}
