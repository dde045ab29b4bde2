//! SQLite dataset output.
//!
//! Rows go into the `methods` table together with the hex digest of their
//! deduplication key, so a later run can resume with the same keys seeded.

use std::path::Path;

use rusqlite::Connection;

use crate::clean::dedup::{dedup_key, DedupKeyMode, KeyDigest, SeenKeys};
use crate::errors::{HarvestError, HarvestResult};
use crate::models::MethodRecord;
use crate::store::schema;
use crate::store::RowSink;

const INSERT_METHOD: &str = "INSERT INTO methods(repo_name, repo_url, commit_sha, file_path, \
    method_name, start_line, end_line, signature, original_code, code_tokens, dedup_key) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);";

pub struct SqliteSink {
    conn: Connection,
    mode: DedupKeyMode,
    in_transaction: bool,
}

impl SqliteSink {
    /// Open `path` for a fresh dataset, dropping rows from earlier runs.
    pub fn create(path: &Path, mode: DedupKeyMode) -> HarvestResult<Self> {
        let sink = Self::with_connection(Connection::open(path)?, mode)?;
        sink.conn.execute_batch("DELETE FROM methods;")?;
        schema::set_meta(&sink.conn, "dedup_key", &mode.to_string())?;
        Ok(sink)
    }

    /// Open `path` keeping existing rows. The stored key mode must match.
    pub fn resume(path: &Path, mode: DedupKeyMode) -> HarvestResult<Self> {
        let sink = Self::with_connection(Connection::open(path)?, mode)?;
        match schema::get_meta(&sink.conn, "dedup_key")? {
            Some(stored) if stored != mode.to_string() => {
                return Err(HarvestError::Config(format!(
                    "dataset was deduplicated by {stored}, cannot resume with {mode}"
                )));
            }
            Some(_) => {}
            None => schema::set_meta(&sink.conn, "dedup_key", &mode.to_string())?,
        }
        Ok(sink)
    }

    pub fn in_memory(mode: DedupKeyMode) -> HarvestResult<Self> {
        let sink = Self::with_connection(Connection::open_in_memory()?, mode)?;
        schema::set_meta(&sink.conn, "dedup_key", &mode.to_string())?;
        Ok(sink)
    }

    fn with_connection(conn: Connection, mode: DedupKeyMode) -> HarvestResult<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            mode,
            in_transaction: false,
        })
    }

    pub fn row_count(&self) -> HarvestResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM methods;", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Keys of every stored row, for seeding a resumed run's deduplicator.
    pub fn seen_keys(&self) -> HarvestResult<SeenKeys> {
        let mut stmt = self.conn.prepare("SELECT dedup_key FROM methods;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut seen = SeenKeys::new();
        for hex in rows {
            let hex = hex?;
            let key = parse_hex(&hex).ok_or_else(|| {
                HarvestError::Config(format!("corrupt dedup key in dataset: {hex}"))
            })?;
            seen.insert(key);
        }
        Ok(seen)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn commit(&mut self) -> HarvestResult<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT;")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

impl RowSink for SqliteSink {
    fn append(&mut self, record: &MethodRecord) -> HarvestResult<()> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN;")?;
            self.in_transaction = true;
        }
        let key = to_hex(&dedup_key(record, self.mode));
        let tokens = serde_json::to_string(&record.code_tokens)?;
        let mut stmt = self.conn.prepare_cached(INSERT_METHOD)?;
        stmt.execute(rusqlite::params![
            record.repo_name,
            record.repo_url,
            record.commit_sha,
            record.file_path,
            record.method_name,
            record.start_line as i64,
            record.end_line as i64,
            record.signature,
            record.original_code,
            tokens,
            key,
        ])?;
        Ok(())
    }

    fn check_key_mode(&self, mode: DedupKeyMode) -> HarvestResult<()> {
        if mode != self.mode {
            return Err(HarvestError::Config(format!(
                "run deduplicates by {mode} but the database stores {} keys",
                self.mode
            )));
        }
        Ok(())
    }

    fn flush(&mut self) -> HarvestResult<()> {
        self.commit()
    }
}

impl Drop for SqliteSink {
    fn drop(&mut self) {
        if self.in_transaction {
            let _ = self.conn.execute_batch("ROLLBACK;");
        }
    }
}

fn to_hex(key: &KeyDigest) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_hex(hex: &str) -> Option<KeyDigest> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, code: &str) -> MethodRecord {
        MethodRecord {
            repo_name: "acme/widgets".into(),
            repo_url: "https://github.com/acme/widgets".into(),
            commit_sha: "c0ffee".into(),
            file_path: "src/A.java".into(),
            method_name: name.into(),
            start_line: 3,
            end_line: 7,
            signature: format!("void {name}()"),
            original_code: code.into(),
            code_tokens: vec!["void".into(), name.into()],
        }
    }

    #[test]
    fn rows_are_visible_after_flush() {
        let mut sink = SqliteSink::in_memory(DedupKeyMode::Code).unwrap();
        sink.append(&record("f", "void f() { a(); }")).unwrap();
        sink.append(&record("g", "void g() { b(); }")).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.row_count().unwrap(), 2);

        let (name, tokens, start): (String, String, i64) = sink
            .connection()
            .query_row(
                "SELECT method_name, code_tokens, start_line FROM methods ORDER BY id LIMIT 1;",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(name, "f");
        assert_eq!(tokens, r#"["void","f"]"#);
        assert_eq!(start, 3);
    }

    #[test]
    fn resume_seeds_keys_and_checks_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.sqlite");
        let first = record("f", "void f() { a(); }");
        {
            let mut sink = SqliteSink::create(&path, DedupKeyMode::Code).unwrap();
            sink.append(&first).unwrap();
            sink.finish().unwrap();
        }

        let resumed = SqliteSink::resume(&path, DedupKeyMode::Code).unwrap();
        let seen = resumed.seen_keys().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&dedup_key(&first, DedupKeyMode::Code)));
        drop(resumed);

        let err = SqliteSink::resume(&path, DedupKeyMode::Location).err().unwrap();
        assert!(matches!(err, HarvestError::Config(_)));

        let fresh = SqliteSink::create(&path, DedupKeyMode::Location).unwrap();
        assert_eq!(fresh.row_count().unwrap(), 0);
    }

    #[test]
    fn hex_keys_round_trip() {
        let key = dedup_key(&record("f", "x"), DedupKeyMode::Code);
        assert_eq!(parse_hex(&to_hex(&key)), Some(key));
        assert_eq!(parse_hex("zz"), None);
    }
}
