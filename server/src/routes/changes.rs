//! Change submission routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tally_engine::ChangeRequest;

use crate::error::Result;
use crate::handlers::{handle_submit, SubmitResponse};
use crate::AppState;

/// Create change routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/changes", post(submit_handler))
}

/// POST /changes - Submit one change.
async fn submit_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChangeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload?;
    let response = handle_submit(&state.backend, request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
