use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::schema;

/// Single-connection manager for the curation database. All reads and
/// writes across references, articles, and evaluations go through one
/// connection; writes commit individually and stay short.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Database file size in bytes (0 for in-memory databases).
    pub fn db_size(&self) -> u64 {
        let page_count: u64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: u64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);
        page_count * page_size
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Clean shutdown: flush WAL to the main DB
        let _ = self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

/// Timestamps persist as RFC-3339 UTC strings, which also makes their
/// lexicographic order chronological.
pub(crate) fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

pub(crate) fn decode_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp '{raw}': {e}")))
}

pub(crate) fn decode_time_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_time(&s)).transpose()
}
