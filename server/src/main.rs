//! Tally Server - shared shopping-list server.
//!
//! Serves the JSON API from tally-server's router over either the in-memory
//! backend or PostgreSQL, chosen by configuration.

use tally_server::backend::Backend;
use tally_server::config::Config;
use tally_server::{app, db, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Tally Server on {}:{}", config.host, config.port);

    let backend = match (&config.database_url, &config.snapshot_path) {
        (Some(url), _) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await?;
            Backend::postgres(pool)
        }
        (None, Some(path)) => Backend::memory_with_snapshot(path).await?,
        (None, None) => {
            tracing::warn!("No DATABASE_URL or SNAPSHOT_PATH set; lists live in memory only");
            Backend::memory()
        }
    };
    tracing::info!("Using {} backend", backend.name());

    let addr = config.bind_addr();
    let app = app(AppState::new(backend, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
