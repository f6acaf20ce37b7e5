//! List handler - serves a list's log and merged state.

use crate::backend::Backend;
use crate::error::Result;
use tally_engine::ListView;

/// Read a list. Unknown lists are `NotFound`, never an empty list.
pub async fn handle_get_list(backend: &Backend, list_id: &str) -> Result<ListView> {
    let view = backend.get_state(list_id).await?;
    tracing::debug!(
        list_id,
        changes = view.log.len(),
        items = view.state.len(),
        "served list"
    );
    Ok(view)
}
