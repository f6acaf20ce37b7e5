//! Derived per-item state.

use crate::{Change, Quantity, Stamp};
use serde::{Deserialize, Serialize};

/// The merged state of one item in a list.
///
/// Never stored on its own: it is the output of folding the list's changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemState {
    /// Desired total quantity
    pub target: Quantity,
    /// Quantity already satisfied
    pub bought: Quantity,
    /// Tombstone flag; quantities are retained while deleted
    pub deleted: bool,
    /// The change that most recently decided this item's fields
    pub last_writer: Stamp,
}

impl ItemState {
    /// Create a live item from an add.
    pub fn added(change: &Change) -> Self {
        Self {
            target: change.target,
            bought: 0,
            deleted: false,
            last_writer: change.stamp(),
        }
    }

    /// Create a live item from an update whose add has not been seen.
    pub fn upserted(change: &Change) -> Self {
        Self {
            target: change.target,
            bought: change.bought,
            deleted: false,
            last_writer: change.stamp(),
        }
    }

    /// Check if item is active (not deleted).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Quantity still to buy.
    pub fn remaining(&self) -> Quantity {
        self.target.saturating_sub(self.bought)
    }

    /// Mark item as deleted, keeping quantities as the tombstone.
    pub fn mark_deleted(&mut self, stamp: Stamp) {
        self.deleted = true;
        self.last_writer = stamp;
    }

    /// Overwrite quantities with absolute values.
    pub fn set_quantities(&mut self, target: Quantity, bought: Quantity, stamp: Stamp) {
        self.target = target;
        self.bought = bought;
        self.last_writer = stamp;
    }

    /// Bring a tombstone back to life as a fresh add.
    pub fn resurrect(&mut self, change: &Change) {
        *self = Self::added(change);
    }

    /// Turn a signed amount into absolute quantities for an update change.
    ///
    /// A non-negative delta raises `target`; a negative delta records that
    /// many units as bought. Returns `(target, bought)`.
    pub fn apply_delta(&self, delta: i64) -> (Quantity, Quantity) {
        if delta >= 0 {
            (self.target.saturating_add(delta as Quantity), self.bought)
        } else {
            (self.target, self.bought.saturating_add(delta.unsigned_abs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milk() -> ItemState {
        ItemState::added(&Change::add("groceries", "milk", 4, "phone", 1))
    }

    #[test]
    fn added_item_starts_unbought() {
        let change = Change::new(crate::ChangeKind::Add, "l", "milk", 4, 3, "phone", 1);
        let item = ItemState::added(&change);
        assert_eq!(item.target, 4);
        assert_eq!(item.bought, 0);
        assert!(item.is_active());
        assert_eq!(item.last_writer, Stamp::new(1, "phone"));
    }

    #[test]
    fn delete_keeps_tombstone_values() {
        let mut item = milk();
        item.mark_deleted(Stamp::new(2, "laptop"));
        assert!(!item.is_active());
        assert_eq!(item.target, 4);
        assert_eq!(item.last_writer, Stamp::new(2, "laptop"));
    }

    #[test]
    fn resurrect_resets_bought() {
        let mut item = milk();
        item.set_quantities(4, 2, Stamp::new(2, "phone"));
        item.mark_deleted(Stamp::new(3, "phone"));
        item.resurrect(&Change::add("groceries", "milk", 1, "laptop", 4));
        assert_eq!((item.target, item.bought, item.deleted), (1, 0, false));
    }

    #[test]
    fn apply_delta() {
        let mut item = milk();
        item.set_quantities(4, 1, Stamp::new(2, "phone"));
        assert_eq!(item.apply_delta(3), (7, 1));
        assert_eq!(item.apply_delta(0), (4, 1));
        assert_eq!(item.apply_delta(-2), (4, 3));
        assert_eq!(item.remaining(), 3);
    }

    #[test]
    fn apply_delta_saturates() {
        let mut item = milk();
        item.set_quantities(u64::MAX, 0, Stamp::new(2, "phone"));
        assert_eq!(item.apply_delta(1), (u64::MAX, 0));
        assert_eq!(item.apply_delta(i64::MIN).1, i64::MIN.unsigned_abs());
    }
}
