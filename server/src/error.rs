//! Unified error handling for the server.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tally_engine::Error as EngineError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] std::io::Error),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Unprocessable(rejection.body_text())
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Engine(e) => engine_status(e),
            AppError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            AppError::Snapshot(e) => {
                tracing::error!("Snapshot write failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Snapshot write failed".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

fn engine_status(e: &EngineError) -> (StatusCode, String, Option<String>) {
    match e {
        EngineError::Validation(v) => {
            tracing::debug!("Rejected change: {}", v);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                Some(v.to_string()),
            )
        }
        EngineError::NotFound(list_id) => (
            StatusCode::NOT_FOUND,
            format!("List not found: {}", list_id),
            None,
        ),
        EngineError::IdentityUnavailable(reason) => {
            tracing::warn!("Identity unavailable: {}", reason);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Identity unavailable".to_string(),
                Some(reason.clone()),
            )
        }
        EngineError::InvalidSnapshot(reason) => {
            tracing::error!("Invalid snapshot: {}", reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid snapshot".to_string(),
                None,
            )
        }
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
