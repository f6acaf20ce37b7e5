//! Error types for the Tally engine.

use crate::ListId;
use thiserror::Error;

/// Why a change was refused before reaching the log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("list id must not be empty")]
    EmptyListId,

    #[error("item name must not be empty")]
    EmptyItemName,

    #[error("field '{field}' must be non-negative, got {value}")]
    NegativeQuantity { field: &'static str, value: i64 },

    #[error("invalid replica id: {0}")]
    InvalidReplica(String),

    #[error("unknown change kind: {0}")]
    UnknownKind(String),

    #[error("change routed to list '{actual}' but log holds '{expected}'")]
    WrongList { expected: ListId, actual: ListId },
}

/// All possible errors from the Tally engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("list not found: {0}")]
    NotFound(ListId),

    #[error("replica identity unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
