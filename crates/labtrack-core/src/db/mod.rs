//! Database layer for labtrack.
//!
//! SQLite plays the role of the document store: nested documents (line
//! items, order attributes) live in JSON text columns, and the traits in
//! [`repository`] are the only surface the allocator and the migration
//! runner see.

mod schema;
mod catalog;
mod checkpoint;
mod orders;
mod repository;
mod stream;

pub use schema::*;
pub use checkpoint::*;
pub use repository::*;
pub use stream::*;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

/// Fixed-width UTC encoding, so text comparison matches time order.
pub(crate) fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(s: &str) -> DbResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labtrack.db");

        drop(Database::open(&path).unwrap());
        // Reopening runs the idempotent schema again
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"test_catalog".to_string()));
        assert!(tables.contains(&"orders".to_string()));
        assert!(tables.contains(&"order_counters".to_string()));
        assert!(tables.contains(&"migration_state".to_string()));
    }

    #[test]
    fn test_timestamp_encoding_sorts_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap();

        let (a, b) = (encode_timestamp(&early), encode_timestamp(&late));
        assert_eq!(a, "2024-03-07T09:05:00.000000Z");
        assert!(a < b);
        assert_eq!(decode_timestamp(&a).unwrap(), early);
    }
}
