//! Migration checkpoint persistence.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{CheckpointStore, Database, DbResult};
use crate::models::OrderCursor;

/// Progress marker of an interrupted sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationCheckpoint {
    /// Last order fully processed
    pub cursor: OrderCursor,
    /// Fingerprint of the catalog the sweep ran against
    pub catalog_fingerprint: String,
    /// Orders scanned before the checkpoint
    pub orders_scanned: usize,
    /// Orders updated before the checkpoint
    pub orders_updated: usize,
    #[serde(default)]
    pub orders_failed: usize,
    #[serde(default)]
    pub orders_malformed: usize,
    /// Save timestamp
    pub saved_at: String,
}

impl CheckpointStore for Database {
    fn load_checkpoint(&self, name: &str) -> DbResult<Option<MigrationCheckpoint>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM migration_state WHERE key = ?",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
    }

    fn save_checkpoint(&self, name: &str, checkpoint: &MigrationCheckpoint) -> DbResult<()> {
        let value = serde_json::to_string(checkpoint)?;
        self.conn.execute(
            r#"
            INSERT INTO migration_state (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![name, value],
        )?;
        Ok(())
    }

    fn clear_checkpoint(&self, name: &str) -> DbResult<()> {
        self.conn
            .execute("DELETE FROM migration_state WHERE key = ?", [name])?;
        Ok(())
    }
}
