//! Snapshot types for persisting and restoring change logs.
//!
//! Snapshots are the bridge between the in-memory [`ChangeLog`](crate::ChangeLog)
//! and persistent storage. They are designed for deterministic serialization
//! to ensure consistency.

use crate::{error::Result, Change, Error, ListId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of every list's changes.
///
/// Uses BTreeMap instead of HashMap for deterministic serialization order.
/// Deserialization decodes each record on its own: a record that fails to
/// decode is logged and counted in `unreadable` instead of failing the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct LogSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Changes per list, in append order
    pub lists: BTreeMap<ListId, Vec<Change>>,
    /// Records dropped while decoding
    #[serde(skip)]
    pub unreadable: usize,
}

/// Wire form of a snapshot before individual records are decoded.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    format_version: u32,
    #[serde(default)]
    lists: BTreeMap<ListId, Vec<serde_json::Value>>,
}

impl From<RawSnapshot> for LogSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        let mut unreadable = 0;
        let mut lists = BTreeMap::new();

        for (list_id, records) in raw.lists {
            let mut changes = Vec::with_capacity(records.len());
            for record in records {
                match serde_json::from_value::<Change>(record) {
                    Ok(change) => changes.push(change),
                    Err(e) => {
                        tracing::warn!(
                            list_id = %list_id,
                            error = %e,
                            "skipping unreadable snapshot record"
                        );
                        unreadable += 1;
                    }
                }
            }
            lists.insert(list_id, changes);
        }

        Self {
            format_version: raw.format_version,
            lists,
            unreadable,
        }
    }
}

impl Default for LogSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            lists: BTreeMap::new(),
            unreadable: 0,
        }
    }

    /// Add a change under its own list.
    pub fn add_change(&mut self, change: Change) {
        self.lists
            .entry(change.list_id.clone())
            .or_default()
            .push(change);
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// Count changes across all lists.
    pub fn change_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata::from(self)
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub list_count: usize,
    pub change_count: usize,
}

impl From<&LogSnapshot> for SnapshotMetadata {
    fn from(snapshot: &LogSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            list_count: snapshot.list_count(),
            change_count: snapshot.change_count(),
        }
    }
}
