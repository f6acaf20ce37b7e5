//! Reconciliation: folding a change set into item state.
//!
//! This is the core of determinism. Given every change known for a list, in
//! any order and with any number of duplicates, this module produces the one
//! item-state mapping that every replica converges to.
//!
//! # Algorithm
//!
//! 1. Drop records that fail validation or belong to another list (counted,
//!    never fatal)
//! 2. Deduplicate by idempotency key
//! 3. Group by item name
//! 4. Sort each group by (timestamp, replica, kind, ...) for total ordering
//! 5. Fold each group with last-writer-wins rules:
//!    - add creates the item, or resurrects an older tombstone; an add on a
//!      live item is superseded, so the first creator wins
//!    - update overwrites quantities with absolute values; it creates the
//!      item if its add has not been seen
//!    - remove tombstones the item, keeping its quantities
//!
//! Because the fold order is derived from the changes themselves rather than
//! from arrival order, the result is commutative, associative, and idempotent.

use crate::{Change, ChangeKind, IdempotencyKey, ItemName, ItemState, ListId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Counters describing one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    /// Changes that decided an item's fields
    pub applied: usize,
    /// Changes that lost to a newer (or first) writer
    pub superseded: usize,
    /// Records dropped because they failed to parse or validate
    pub skipped: usize,
}

/// Result of reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    /// Every item ever seen, tombstones included
    pub items: BTreeMap<ItemName, ItemState>,
    pub stats: MergeStats,
}

impl Reconciled {
    /// Get an item, including tombstones.
    pub fn get(&self, item_name: &str) -> Option<&ItemState> {
        self.items.get(item_name)
    }

    /// All items including tombstones.
    pub fn all(&self) -> &BTreeMap<ItemName, ItemState> {
        &self.items
    }

    /// Iterate over live items.
    pub fn active(&self) -> impl Iterator<Item = (&ItemName, &ItemState)> {
        self.items.iter().filter(|(_, item)| item.is_active())
    }

    /// Count of live items.
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Count of records dropped as malformed.
    pub fn skipped(&self) -> usize {
        self.stats.skipped
    }
}

/// Merge one list's change set into item state.
///
/// Changes failing [`Change::validate`] are treated as malformed historical
/// records: skipped, counted, and logged. The list is set by the first valid
/// change; changes for any other list are skipped the same way.
pub fn merge<I>(changes: I) -> Reconciled
where
    I: IntoIterator<Item = Change>,
{
    merge_records(changes.into_iter().map(Ok::<_, ValidationError>))
}

/// Merge records that may have failed to decode from storage.
///
/// Every `Err` is counted as skipped and the fold continues with the rest.
pub fn merge_records<I, E>(records: I) -> Reconciled
where
    I: IntoIterator<Item = Result<Change, E>>,
    E: std::fmt::Display,
{
    let mut stats = MergeStats::default();
    let mut list_id: Option<ListId> = None;
    let mut unique: HashMap<IdempotencyKey, Change> = HashMap::new();

    for record in records {
        let change = match validated(record) {
            Ok(change) => change,
            Err(reason) => {
                tracing::warn!(%reason, "skipping malformed change record");
                stats.skipped += 1;
                continue;
            }
        };

        match &list_id {
            Some(expected) if *expected != change.list_id => {
                tracing::warn!(
                    expected = %expected,
                    list_id = %change.list_id,
                    "skipping change for another list"
                );
                stats.skipped += 1;
                continue;
            }
            Some(_) => {}
            None => list_id = Some(change.list_id.clone()),
        }

        // Colliding keys keep the greatest change so the pick is order-free
        let key = change.idempotency_key();
        match unique.get(&key) {
            Some(existing) if *existing >= change => {}
            _ => {
                unique.insert(key, change);
            }
        }
    }

    let mut groups: BTreeMap<ItemName, Vec<Change>> = BTreeMap::new();
    for change in unique.into_values() {
        groups
            .entry(change.item_name.clone())
            .or_default()
            .push(change);
    }

    let mut items = BTreeMap::new();
    for (item_name, mut group) in groups {
        group.sort();
        if let Some(state) = fold_item(&group, &mut stats) {
            items.insert(item_name, state);
        }
    }

    Reconciled { items, stats }
}

/// Fold one item's changes, already sorted ascending.
fn fold_item(sorted: &[Change], stats: &mut MergeStats) -> Option<ItemState> {
    // Winning change alongside the state, so "newer" uses the full order
    // including the kind tie-break.
    let mut current: Option<(ItemState, &Change)> = None;

    for change in sorted {
        let applied = match (change.kind, current.as_mut()) {
            (ChangeKind::Add, None) | (ChangeKind::Update, None) => {
                let state = if change.kind == ChangeKind::Add {
                    ItemState::added(change)
                } else {
                    ItemState::upserted(change)
                };
                current = Some((state, change));
                true
            }
            (ChangeKind::Remove, None) => false,
            (ChangeKind::Add, Some((state, last))) => {
                if state.deleted && change > *last {
                    state.resurrect(change);
                    *last = change;
                    true
                } else {
                    false
                }
            }
            (ChangeKind::Update, Some((state, last))) => {
                if change > *last {
                    state.set_quantities(change.target, change.bought, change.stamp());
                    *last = change;
                    true
                } else {
                    false
                }
            }
            (ChangeKind::Remove, Some((state, last))) => {
                if change > *last {
                    state.mark_deleted(change.stamp());
                    *last = change;
                    true
                } else {
                    false
                }
            }
        };

        if applied {
            stats.applied += 1;
        } else {
            stats.superseded += 1;
        }
    }

    current.map(|(state, _)| state)
}

fn validated<E: std::fmt::Display>(record: Result<Change, E>) -> Result<Change, String> {
    let change = record.map_err(|e| e.to_string())?;
    change.validate().map_err(|e| e.to_string())?;
    Ok(change)
}
