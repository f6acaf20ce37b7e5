//! # Tally Engine
//!
//! A deterministic reconciliation engine for shared shopping lists.
//!
//! Many devices ("replicas") edit the same list while online, offline, or
//! racing each other. Each edit is captured as an immutable [`Change`] and
//! appended to the list's [`ChangeLog`]. The visible state of a list is never
//! stored on its own: it is always recomputed by [`merge`], a pure fold that
//! yields the same [`ItemState`] mapping for any delivery order of the same
//! set of changes.
//!
//! ## Design Principles
//!
//! - **No transport**: the engine knows nothing about HTTP or sockets
//! - **Deterministic**: same change set, same state, on every replica
//! - **Idempotent**: re-delivered changes are absorbed without effect
//! - **Portable**: runs anywhere Rust runs (native, WASM, embedded via [`ffi`])
//!
//! ## Core Concepts
//!
//! ### Changes
//!
//! Edits are expressed as changes, never as in-place mutations:
//! - [`ChangeKind::Add`] - create an item, or resurrect a removed one
//! - [`ChangeKind::Update`] - set absolute `target` / `bought` quantities
//! - [`ChangeKind::Remove`] - tombstone an item
//!
//! Two changes with the same [`IdempotencyKey`] are the same edit.
//!
//! ### Effective key
//!
//! Changes are ordered by their [`Stamp`], the pair `(timestamp, replica)`.
//! The replica id breaks timestamp ties lexically, giving a total order even
//! across clock skew.
//!
//! ### Reconciliation
//!
//! [`merge`] groups changes by item and folds each group in stamp order using
//! last-writer-wins. Removed items are kept as tombstones so that later adds
//! and updates still compare ages correctly.
//!
//! ## Quick Start
//!
//! ```rust
//! use tally_engine::{Change, ChangeKind, ListService};
//!
//! let service = ListService::new();
//!
//! service
//!     .submit(Change::new(ChangeKind::Add, "groceries", "milk", 2, 0, "phone", 1))
//!     .unwrap();
//! service
//!     .submit(Change::new(ChangeKind::Update, "groceries", "milk", 2, 1, "laptop", 2))
//!     .unwrap();
//!
//! let view = service.get_state("groceries").unwrap();
//! let milk = &view.state["milk"];
//! assert_eq!((milk.target, milk.bought, milk.deleted), (2, 1, false));
//! ```
//!
//! ## Persistence
//!
//! Use [`ChangeLog::export_snapshot`] and [`ChangeLog::import_snapshot`] with
//! [`LogSnapshot`] to persist an in-memory log. Snapshots serialize with
//! deterministic ordering.

pub mod change;
pub mod clock;
pub mod error;
pub mod ffi;
pub mod identity;
pub mod item;
pub mod log;
pub mod reconcile;
pub mod service;
pub mod snapshot;

// Re-export main types at crate root
pub use change::{Change, ChangeKind, ChangeRequest, IdempotencyKey};
pub use clock::Stamp;
pub use error::{Error, ValidationError};
pub use identity::{
    validate_replica_id, FileIdentityStore, FnMinter, IdentityMinter, IdentityStore,
    MemoryIdentityStore, ReplicaIdentity, UuidMinter,
};
pub use item::ItemState;
pub use log::{ChangeLog, ListLog};
pub use reconcile::{merge, merge_records, MergeStats, Reconciled};
pub use service::{ListService, ListView};
pub use snapshot::{LogSnapshot, SnapshotMetadata, SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type ReplicaId = String;
pub type ListId = String;
pub type ItemName = String;
pub type Timestamp = u64;
pub type Quantity = u64;
/// Zero-based index of a change within its list's log.
pub type Position = usize;
