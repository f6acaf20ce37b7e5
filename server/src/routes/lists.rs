//! List read routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tally_engine::ListView;

use crate::error::Result;
use crate::handlers::handle_get_list;
use crate::AppState;

/// Create list routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lists/{list_id}", get(get_list_handler))
        .route("/list.json/{list_id}", get(get_list_handler))
}

/// GET /lists/{listId} - Read a list's log and merged state.
async fn get_list_handler(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<ListView>> {
    let view = handle_get_list(&state.backend, &list_id).await?;
    Ok(Json(view))
}
