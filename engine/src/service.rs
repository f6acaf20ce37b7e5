//! ListService - routes changes to their list and serves merged views.

use crate::{
    error::Result, merge, Change, ChangeLog, ChangeRequest, Error, ItemName, ItemState, ListId,
    Position, Reconciled,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A list's full log alongside its merged state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub list_id: ListId,
    /// Every retained change, in append order
    pub log: Vec<Change>,
    /// Merged state per item, tombstones included
    pub state: BTreeMap<ItemName, ItemState>,
}

impl ListView {
    /// Iterate over live items.
    pub fn active(&self) -> impl Iterator<Item = (&ItemName, &ItemState)> {
        self.state.iter().filter(|(_, item)| item.is_active())
    }
}

/// A merged view and the log length it was computed from.
#[derive(Debug, Clone)]
struct CachedView {
    log_len: usize,
    merged: Arc<Reconciled>,
}

/// Entry point for submitting changes and reading lists.
///
/// Holds one [`ChangeLog`] for all lists and caches each list's merge. The
/// log is append-only, so a cached merge is valid exactly while the log
/// length it was computed from is unchanged.
#[derive(Debug, Default)]
pub struct ListService {
    log: ChangeLog,
    views: DashMap<ListId, CachedView>,
}

impl ListService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing log, e.g. one restored from a snapshot.
    pub fn with_log(log: ChangeLog) -> Self {
        Self {
            log,
            views: DashMap::new(),
        }
    }

    /// The underlying change log.
    pub fn log(&self) -> &ChangeLog {
        &self.log
    }

    /// Validate and append a change to its list.
    ///
    /// Resubmitting a change is a no-op that returns its original position.
    pub fn submit(&self, change: Change) -> Result<Position> {
        let list_id = change.list_id.clone();
        let position = self.log.append(change)?;
        self.views.remove(&list_id);
        Ok(position)
    }

    /// Validate and append a wire request, assigning a timestamp if it has
    /// none. Returns the change as stored.
    pub fn submit_request(&self, request: ChangeRequest) -> Result<Change> {
        let list_id = request.list_id.clone();
        let (position, change) = self
            .log
            .append_with(&list_id, |next| request.into_change(|_| next))?;
        self.views.remove(&list_id);

        tracing::debug!(
            list_id = %change.list_id,
            item = %change.item_name,
            kind = %change.kind,
            replica = %change.replica,
            timestamp = change.timestamp,
            position,
            "accepted change"
        );
        Ok(change)
    }

    /// Merged state of a list.
    ///
    /// Fails with [`Error::NotFound`] if the list never received a change.
    pub fn get_state(&self, list_id: &str) -> Result<ListView> {
        if !self.log.contains_list(list_id) {
            return Err(Error::NotFound(list_id.to_string()));
        }

        let log = self.log.read_all(list_id);
        let merged = self.merged(list_id, &log);

        Ok(ListView {
            list_id: list_id.to_string(),
            log,
            state: merged.items.clone(),
        })
    }

    fn merged(&self, list_id: &str, log: &[Change]) -> Arc<Reconciled> {
        if let Some(cached) = self.views.get(list_id) {
            if cached.log_len == log.len() {
                return cached.merged.clone();
            }
        }

        let merged = Arc::new(merge(log.iter().cloned()));
        if merged.skipped() > 0 {
            tracing::warn!(
                list_id,
                skipped = merged.skipped(),
                "skipped malformed changes while merging"
            );
        }

        self.views.insert(
            list_id.to_string(),
            CachedView {
                log_len: log.len(),
                merged: merged.clone(),
            },
        );
        merged
    }
}
