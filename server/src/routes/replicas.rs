//! Replica identity routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::error::Result;
use crate::handlers::{handle_mint, ReplicaResponse};
use crate::AppState;

/// Create replica routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/replicas", post(mint_handler))
        .route("/generate_id", get(mint_handler))
}

/// POST /replicas - Mint a replica id for a new device.
async fn mint_handler(State(state): State<AppState>) -> Result<Json<ReplicaResponse>> {
    let response = handle_mint(state.minter.as_ref())?;
    Ok(Json(response))
}
