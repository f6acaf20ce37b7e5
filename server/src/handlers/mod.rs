//! Request handlers for list operations.

mod changes;
mod lists;
mod replicas;

pub use changes::*;
pub use lists::*;
pub use replicas::*;
