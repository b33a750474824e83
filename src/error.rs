//! Error types for WebBridge
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Permission and not-found conditions are resolved into plain reply
//! text at the bridge boundary; they only surface as HTTP errors on
//! the web side (capability URL verification, admin endpoints).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Acting user is not allowed to perform the operation (403)
    #[error("Permission denied")]
    PermissionDenied,

    /// Target user or entity absent (404)
    #[error("Resource not found")]
    NotFound,

    /// Media descriptor extraction failed and no fallback applied (415)
    #[error("Unsupported media")]
    UnsupportedMedia,

    /// Persistence unavailable (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Outbound HTTP failure (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Bot API rejected a request (502)
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::PermissionDenied => {
                (StatusCode::FORBIDDEN, self.to_string(), "permission_denied")
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::UnsupportedMedia => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                self.to_string(),
                "unsupported_media",
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Telegram(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "telegram"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
