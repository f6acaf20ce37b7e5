//! Tally Server - HTTP surface for shared shopping lists.
//!
//! Replicas submit changes and read merged lists over JSON. All merge logic
//! lives in tally-engine; this crate routes requests to a storage backend.

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::backend::Backend;
use crate::config::Config;
use axum::Router;
use std::sync::Arc;
use tally_engine::{IdentityMinter, UuidMinter};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub config: Arc<Config>,
    pub minter: Arc<dyn IdentityMinter + Send + Sync>,
}

impl AppState {
    /// State minting UUID v4 replica ids.
    pub fn new(backend: Backend, config: Config) -> Self {
        Self::with_minter(backend, config, Arc::new(UuidMinter))
    }

    pub fn with_minter(
        backend: Backend,
        config: Config,
        minter: Arc<dyn IdentityMinter + Send + Sync>,
    ) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            minter,
        }
    }
}

/// Build the application router with tracing and permissive CORS.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
