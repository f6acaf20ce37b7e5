//! Change types for expressing edits.
//!
//! Edits are expressed as immutable changes, not direct mutations. A
//! correction is a new change with a fresh timestamp. This is what lets the
//! log be replayed, deduplicated, and merged in any order.

use crate::{
    error::ValidationError, identity::validate_replica_id, ItemName, ListId, Quantity, ReplicaId,
    Stamp, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The intent of a change.
///
/// Variant order is the tie-break rank used when two changes share an
/// effective key: `Add < Update < Remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Update,
    Remove,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Update => "update",
            ChangeKind::Remove => "remove",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ChangeKind::Add),
            "update" => Ok(ChangeKind::Update),
            "remove" => Ok(ChangeKind::Remove),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// Identity of an edit. Two changes with equal keys are the same edit,
/// delivered more than once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyKey {
    pub replica: ReplicaId,
    pub timestamp: Timestamp,
    pub list_id: ListId,
    pub item_name: ItemName,
    pub kind: ChangeKind,
}

/// One immutable edit against a shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// What the edit does
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Target list
    pub list_id: ListId,
    /// Item key, unique within the list's active state
    pub item_name: ItemName,
    /// Desired total quantity
    #[serde(default)]
    pub target: Quantity,
    /// Quantity already satisfied
    #[serde(default)]
    pub bought: Quantity,
    /// Issuing replica
    pub replica: ReplicaId,
    /// Per-replica monotonically increasing time of the edit
    pub timestamp: Timestamp,
}

impl Change {
    /// Create a new change.
    pub fn new(
        kind: ChangeKind,
        list_id: impl Into<ListId>,
        item_name: impl Into<ItemName>,
        target: Quantity,
        bought: Quantity,
        replica: impl Into<ReplicaId>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind,
            list_id: list_id.into(),
            item_name: item_name.into(),
            target,
            bought,
            replica: replica.into(),
            timestamp,
        }
    }

    /// Add an item with a target quantity. Nothing is bought yet.
    pub fn add(
        list_id: impl Into<ListId>,
        item_name: impl Into<ItemName>,
        target: Quantity,
        replica: impl Into<ReplicaId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(ChangeKind::Add, list_id, item_name, target, 0, replica, timestamp)
    }

    /// Set absolute quantities on an item.
    pub fn update(
        list_id: impl Into<ListId>,
        item_name: impl Into<ItemName>,
        target: Quantity,
        bought: Quantity,
        replica: impl Into<ReplicaId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            ChangeKind::Update,
            list_id,
            item_name,
            target,
            bought,
            replica,
            timestamp,
        )
    }

    /// Remove an item (tombstone).
    pub fn remove(
        list_id: impl Into<ListId>,
        item_name: impl Into<ItemName>,
        replica: impl Into<ReplicaId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(ChangeKind::Remove, list_id, item_name, 0, 0, replica, timestamp)
    }

    /// Check field invariants. Quantities are unsigned and cannot be
    /// negative here; signed input is rejected by [`ChangeRequest`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.list_id.trim().is_empty() {
            return Err(ValidationError::EmptyListId);
        }
        if self.item_name.trim().is_empty() {
            return Err(ValidationError::EmptyItemName);
        }
        validate_replica_id(&self.replica)
    }

    /// The effective ordering key `(timestamp, replica)`.
    pub fn stamp(&self) -> Stamp {
        Stamp::new(self.timestamp, self.replica.clone())
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey {
            replica: self.replica.clone(),
            timestamp: self.timestamp,
            list_id: self.list_id.clone(),
            item_name: self.item_name.clone(),
            kind: self.kind,
        }
    }
}

/// Ordering for changes used in reconciliation.
/// Changes are ordered by: (timestamp, replica, kind, target, bought, list, item)
///
/// The trailing fields only matter for colliding idempotency keys, which
/// still need a fixed winner.
impl Ord for Change {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.replica.cmp(&other.replica))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.target.cmp(&other.target))
            .then_with(|| self.bought.cmp(&other.bought))
            .then_with(|| self.list_id.cmp(&other.list_id))
            .then_with(|| self.item_name.cmp(&other.item_name))
    }
}

impl PartialOrd for Change {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A change as submitted over the wire.
///
/// Quantities are signed so a negative value is reported as a validation
/// failure instead of a parse failure, and the timestamp is optional so the
/// server can assign one. Snake-case field names from older clients are
/// accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "list_id")]
    pub list_id: ListId,
    #[serde(alias = "item_name")]
    pub item_name: ItemName,
    #[serde(default)]
    pub target: Option<i64>,
    #[serde(default)]
    pub bought: Option<i64>,
    pub replica: ReplicaId,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl ChangeRequest {
    /// Convert into a validated change.
    ///
    /// `assign_timestamp` is called with the list id only when the request
    /// carries no timestamp.
    pub fn into_change<F>(self, assign_timestamp: F) -> Result<Change, ValidationError>
    where
        F: FnOnce(&str) -> Timestamp,
    {
        let kind: ChangeKind = self.kind.parse()?;
        let target = non_negative("target", self.target)?;
        let bought = non_negative("bought", self.bought)?;

        let timestamp = match self.timestamp {
            Some(ts) => ts,
            None => assign_timestamp(&self.list_id),
        };

        let change = Change {
            kind,
            list_id: self.list_id,
            item_name: self.item_name,
            target,
            bought,
            replica: self.replica,
            timestamp,
        };
        change.validate()?;
        Ok(change)
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<Quantity, ValidationError> {
    match value {
        None => Ok(0),
        Some(v) if v < 0 => Err(ValidationError::NegativeQuantity { field, value: v }),
        Some(v) => Ok(v as Quantity),
    }
}
