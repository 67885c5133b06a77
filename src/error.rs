//! Common error types for the image edit gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid base64 data: {0}")]
    Decode(String),

    #[error("Invalid image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Failed to {operation}: {source}")]
    Operation {
        operation: &'static str,
        source: Box<AppError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Store(format!("migration failed: {}", err))
    }
}

impl AppError {
    /// Wrap the error as the failure of a named operation ("remove object", ...)
    pub fn during(self, operation: &'static str) -> Self {
        AppError::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// HTTP status, error type and optional code for this error
    pub fn classify(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::NotConfigured(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                Some("provider_not_configured"),
            ),
            AppError::Provider(_) | AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "provider_error", None),
            AppError::Decode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("invalid_base64")),
            AppError::ImageDecode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("invalid_image")),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("store_error")),
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
            AppError::Operation { source, .. } => source.classify(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

/// Error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = self.classify();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, kind = error_type, error = %message, "Request failed");
        } else {
            tracing::warn!(status = %status, kind = error_type, error = %message, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message,
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
