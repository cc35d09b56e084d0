//! Deduplicating record store.
//!
//! Records are keyed by their dedup key and kept in most-recently-touched
//! order. The key map and the order sequence always change together: every
//! key in `order` has exactly one entry in `records`, and appears once.

mod snapshot;

pub use snapshot::{InMemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, SNAPSHOT_NAME};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::{KeyProfile, Record};
use crate::ScanError;

/// One persisted store entry: the key plus every record field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub key: String,
    #[serde(flatten)]
    pub record: Record,
}

/// Whether an upsert created a new entry or merged into an existing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(String),
    Updated(String),
}

impl UpsertOutcome {
    pub fn key(&self) -> &str {
        match self {
            UpsertOutcome::Inserted(key) | UpsertOutcome::Updated(key) => key,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

#[derive(Debug, Default)]
pub struct RecordStore {
    profile: KeyProfile,
    records: HashMap<String, Record>,
    order: Vec<String>,
}

impl RecordStore {
    pub fn new(profile: KeyProfile) -> Self {
        Self {
            profile,
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn profile(&self) -> KeyProfile {
        self.profile
    }

    /// Merge `record` under its dedup key and move that key to the front.
    ///
    /// Records without a derivable key are rejected and nothing changes.
    pub fn upsert(&mut self, record: Record, now_ms: u64) -> Result<UpsertOutcome, ScanError> {
        let Some(key) = record.dedup_key(self.profile) else {
            return Err(ScanError::NoIdentityKey);
        };

        let outcome = match self.records.get_mut(&key) {
            Some(stored) => {
                stored.merge_from(&record);
                stored.last_seen = now_ms;
                UpsertOutcome::Updated(key.clone())
            }
            None => {
                let mut fresh = record;
                fresh.last_seen = now_ms;
                self.records.insert(key.clone(), fresh);
                UpsertOutcome::Inserted(key.clone())
            }
        };

        self.order.retain(|existing| existing != &key);
        self.order.insert(0, key);
        Ok(outcome)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    /// Keys, most recently touched first.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Entries, most recently touched first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.records.get(key).map(|record| (key.as_str(), record)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current contents in order, for persistence.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.iter()
            .map(|(key, record)| SnapshotEntry {
                key: key.to_string(),
                record: record.clone(),
            })
            .collect()
    }

    /// Replace the contents with a previously saved snapshot.
    ///
    /// Fields are cleaned again, but identity rules are not re-applied: an
    /// entry that was accepted when saved is accepted now. Entries with a
    /// blank key are skipped; a repeated key keeps its first occurrence.
    pub fn restore(&mut self, entries: Vec<SnapshotEntry>) {
        let mut records = HashMap::with_capacity(entries.len());
        let mut order = Vec::with_capacity(entries.len());
        for SnapshotEntry { key, mut record } in entries {
            let key = key.trim().to_string();
            if key.is_empty() {
                log::warn!("skipping snapshot entry with a blank key");
                continue;
            }
            if records.contains_key(&key) {
                log::warn!("skipping repeated snapshot key {}", key);
                continue;
            }
            record.clean();
            order.push(key.clone());
            records.insert(key, record);
        }
        self.records = records;
        self.order = order;
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }
}
