//! Effective ordering key for changes.
//!
//! The stamp provides a total ordering across all replicas, which is
//! essential for deterministic last-writer-wins resolution.

use crate::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The `(timestamp, replica)` pair that decides which change is newer.
///
/// Ordering rules:
/// 1. Higher timestamp wins
/// 2. If timestamps are equal, lexicographically higher replica id wins
///
/// This ensures a total order across all changes from all replicas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    /// Logical or wall-clock time of the change
    pub timestamp: Timestamp,
    /// Replica that issued the change
    pub replica: ReplicaId,
}

impl Stamp {
    /// Create a stamp.
    pub fn new(timestamp: Timestamp, replica: impl Into<ReplicaId>) -> Self {
        Self {
            timestamp,
            replica: replica.into(),
        }
    }

    /// Check if this stamp is strictly newer than another.
    pub fn is_newer_than(&self, other: &Stamp) -> bool {
        self > other
    }

    /// Check if two stamps collide on timestamp but come from different
    /// replicas.
    pub fn is_concurrent_with(&self, other: &Stamp) -> bool {
        self.timestamp == other.timestamp && self.replica != other.replica
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.timestamp.cmp(&other.timestamp) {
            Ordering::Equal => self.replica.cmp(&other.replica),
            other => other,
        }
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_by_timestamp() {
        let older = Stamp::new(1, "replica-z");
        let newer = Stamp::new(2, "replica-a");
        assert!(older < newer);
        assert!(newer.is_newer_than(&older));
    }

    #[test]
    fn ordering_by_replica_when_timestamp_equal() {
        let a = Stamp::new(5, "a");
        let b = Stamp::new(5, "b");
        assert!(a < b); // "a" < "b" lexicographically
        assert!(a.is_concurrent_with(&b));
    }

    #[test]
    fn equal_stamps_are_not_newer() {
        let one = Stamp::new(5, "a");
        let two = Stamp::new(5, "a");
        assert!(!one.is_newer_than(&two));
        assert!(!one.is_concurrent_with(&two)); // same replica
    }

    #[test]
    fn serialization_format() {
        let stamp = Stamp::new(10, "phone");
        let json = serde_json::to_string(&stamp).unwrap();
        assert_eq!(json, r#"{"timestamp":10,"replica":"phone"}"#);
    }
}
