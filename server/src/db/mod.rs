//! Database module for PostgreSQL persistence.

mod changes;
mod pool;

pub use changes::*;
pub use pool::*;
