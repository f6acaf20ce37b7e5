//! ChangeLog - the append-only change store.
//!
//! Each list owns one [`ListLog`]. Appends are validated, deduplicated by
//! idempotency key, and never rewrite or remove an earlier change: a removal
//! is itself a change. The set of changes, not their arrival order, is what
//! reconciliation consumes.

use crate::{
    error::ValidationError, snapshot::LogSnapshot, Change, IdempotencyKey, ListId, Position,
    ReplicaId, Timestamp,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

/// The changes of a single list.
#[derive(Debug, Clone)]
pub struct ListLog {
    list_id: ListId,
    changes: Vec<Change>,
    /// Position of each change by idempotency key
    index: HashMap<IdempotencyKey, Position>,
    /// Highest timestamp seen per replica
    context: BTreeMap<ReplicaId, Timestamp>,
}

impl ListLog {
    /// Create an empty log for a list.
    pub fn new(list_id: impl Into<ListId>) -> Self {
        Self {
            list_id: list_id.into(),
            changes: Vec::new(),
            index: HashMap::new(),
            context: BTreeMap::new(),
        }
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    /// Append a change.
    ///
    /// A change whose idempotency key is already present is a no-op that
    /// returns the original position.
    pub fn append(&mut self, change: Change) -> Result<Position, ValidationError> {
        change.validate()?;
        if change.list_id != self.list_id {
            return Err(ValidationError::WrongList {
                expected: self.list_id.clone(),
                actual: change.list_id,
            });
        }

        let key = change.idempotency_key();
        if let Some(&position) = self.index.get(&key) {
            return Ok(position);
        }

        let position = self.changes.len();
        let seen = self.context.entry(change.replica.clone()).or_insert(0);
        *seen = (*seen).max(change.timestamp);
        self.index.insert(key, position);
        self.changes.push(change);

        Ok(position)
    }

    /// All changes in append order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn get(&self, position: Position) -> Option<&Change> {
        self.changes.get(position)
    }

    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Highest timestamp seen per replica.
    pub fn context(&self) -> &BTreeMap<ReplicaId, Timestamp> {
        &self.context
    }

    /// Highest timestamp seen from any replica.
    pub fn max_timestamp(&self) -> Timestamp {
        self.context.values().copied().max().unwrap_or(0)
    }

    /// A timestamp later than every change in the log.
    pub fn next_timestamp(&self) -> Timestamp {
        self.max_timestamp().saturating_add(1)
    }
}

/// Append-only logs for every list.
///
/// Appends to one list are serialized; different lists never contend beyond
/// sharing a map shard. Reads return a cloned snapshot, never a partially
/// written change.
#[derive(Debug, Default)]
pub struct ChangeLog {
    lists: DashMap<ListId, ListLog>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self {
            lists: DashMap::new(),
        }
    }

    /// Append a change to its list, creating the list on first change.
    ///
    /// Invalid changes are rejected before any list is created.
    pub fn append(&self, change: Change) -> Result<Position, ValidationError> {
        change.validate()?;
        let list_id = change.list_id.clone();
        let (position, _) = self.append_with(&list_id, move |_| Ok(change))?;
        Ok(position)
    }

    /// Build and append a change while holding the list's append lock.
    ///
    /// `build` receives the list's next timestamp, so server-assigned
    /// timestamps cannot race with other appends to the same list.
    pub fn append_with<F>(
        &self,
        list_id: &str,
        build: F,
    ) -> Result<(Position, Change), ValidationError>
    where
        F: FnOnce(Timestamp) -> Result<Change, ValidationError>,
    {
        match self.lists.entry(list_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let log = entry.get_mut();
                let change = build(log.next_timestamp())?;
                let position = log.append(change.clone())?;
                Ok((position, change))
            }
            Entry::Vacant(entry) => {
                let change = build(1)?;
                let mut log = ListLog::new(list_id);
                let position = log.append(change.clone())?;
                entry.insert(log);
                Ok((position, change))
            }
        }
    }

    /// Every retained change for a list; empty for an unknown list.
    pub fn read_all(&self, list_id: &str) -> Vec<Change> {
        self.lists
            .get(list_id)
            .map(|log| log.changes().to_vec())
            .unwrap_or_default()
    }

    /// Whether the list has ever received a change.
    pub fn contains_list(&self, list_id: &str) -> bool {
        self.lists.contains_key(list_id)
    }

    /// A timestamp later than every change on the list.
    pub fn next_timestamp(&self, list_id: &str) -> Timestamp {
        self.lists
            .get(list_id)
            .map(|log| log.next_timestamp())
            .unwrap_or(1)
    }

    /// Highest timestamp seen per replica on a list.
    pub fn context(&self, list_id: &str) -> BTreeMap<ReplicaId, Timestamp> {
        self.lists
            .get(list_id)
            .map(|log| log.context().clone())
            .unwrap_or_default()
    }

    /// Ids of every known list, sorted.
    pub fn list_ids(&self) -> Vec<ListId> {
        let mut ids: Vec<_> = self.lists.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Total number of changes across lists.
    pub fn change_count(&self) -> usize {
        self.lists.iter().map(|e| e.value().len()).sum()
    }

    /// Export every list as a snapshot.
    pub fn export_snapshot(&self) -> LogSnapshot {
        let mut snapshot = LogSnapshot::new();
        for entry in self.lists.iter() {
            for change in entry.value().changes() {
                snapshot.add_change(change.clone());
            }
        }
        snapshot
    }

    /// Append every change from a snapshot.
    ///
    /// Changes already present are absorbed as duplicates. Invalid records,
    /// including those the snapshot could not decode, are skipped; the number
    /// skipped is returned.
    pub fn import_snapshot(&self, snapshot: LogSnapshot) -> usize {
        let mut rejected = snapshot.unreadable;
        for (list_id, changes) in snapshot.lists {
            for change in changes {
                if change.list_id != list_id {
                    tracing::warn!(
                        list_id = %list_id,
                        routed_to = %change.list_id,
                        "skipping snapshot change filed under the wrong list"
                    );
                    rejected += 1;
                    continue;
                }
                if let Err(e) = self.append(change) {
                    tracing::warn!(
                        list_id = %list_id,
                        error = %e,
                        "skipping invalid snapshot change"
                    );
                    rejected += 1;
                }
            }
        }
        rejected
    }
}
