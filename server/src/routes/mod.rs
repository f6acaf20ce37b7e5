//! HTTP route definitions.

mod changes;
mod health;
mod lists;
mod replicas;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(replicas::routes())
        .merge(changes::routes())
        .merge(lists::routes())
}
