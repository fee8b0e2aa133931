//! Shared API plumbing: the error type and the blocking service runner.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rally_service::{EventService, RequestCache, ServiceError};
use rusqlite::Connection;
use std::sync::Arc;
use thiserror::Error;

use crate::AppState;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Authorization(msg) => ApiError::Forbidden(msg),
            other => {
                tracing::error!(error = %other, "event service failure");
                ApiError::InternalServerError("internal error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Runs `f` on the blocking pool with a pooled connection and a fresh
/// request cache.
pub(crate) async fn with_service<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&EventService, &Connection, &mut RequestCache) -> Result<T, ServiceError>
        + Send
        + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        let mut cache = RequestCache::new();
        f(&state.service, &*conn, &mut cache).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}
