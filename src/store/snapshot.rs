use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::SnapshotEntry;

/// Name the record snapshot is saved under.
pub const SNAPSHOT_NAME: &str = "records";

/// Opaque blob storage for the store snapshot.
///
/// Implementations hold the serialized snapshot under a single name and know
/// nothing about records beyond their JSON shape.
pub trait SnapshotStore: Send {
    /// The last saved snapshot, or an empty list when nothing was saved.
    fn load(&self) -> Result<Vec<SnapshotEntry>>;

    fn save(&mut self, entries: &[SnapshotEntry], saved_at_ms: u64) -> Result<()>;

    fn clear(&mut self) -> Result<()>;
}

pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open snapshot db {}", db_path.display()))?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                name TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Millisecond timestamp of the last save, if any.
    pub fn saved_at(&self) -> Result<Option<u64>> {
        let saved_at: Option<i64> = self
            .conn
            .query_row(
                "SELECT saved_at FROM snapshots WHERE name = ?1",
                params![SNAPSHOT_NAME],
                |row| row.get(0),
            )
            .optional()?;
        Ok(saved_at.map(|ms| ms.max(0) as u64))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self) -> Result<Vec<SnapshotEntry>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM snapshots WHERE name = ?1",
                params![SNAPSHOT_NAME],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| anyhow!("stored snapshot is not valid JSON: {}", e)),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, entries: &[SnapshotEntry], saved_at_ms: u64) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        let saved_at = i64::try_from(saved_at_ms).map_err(|_| anyhow!("timestamp overflow"))?;
        self.conn.execute(
            "INSERT INTO snapshots (name, payload_json, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET payload_json = excluded.payload_json,
                                             saved_at = excluded.saved_at",
            params![SNAPSHOT_NAME, json, saved_at],
        )?;
        log::debug!("snapshot saved ({} entries)", entries.len());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM snapshots WHERE name = ?1",
            params![SNAPSHOT_NAME],
        )?;
        Ok(())
    }
}

/// Snapshot store kept in process memory. Holds serialized JSON so that
/// round trips go through the same encoding as SQLite.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    blobs: HashMap<String, String>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Vec<SnapshotEntry>> {
        match self.blobs.get(SNAPSHOT_NAME) {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, entries: &[SnapshotEntry], _saved_at_ms: u64) -> Result<()> {
        self.blobs
            .insert(SNAPSHOT_NAME.to_string(), serde_json::to_string(entries)?);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.blobs.remove(SNAPSHOT_NAME);
        Ok(())
    }
}
