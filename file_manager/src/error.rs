//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::files::ValidationError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File name {name} matches {matches} stored files; specify a category or subfolder")]
    AmbiguousFileName { name: String, matches: usize },

    #[error("Unable to access the HTTP request context")]
    ContextUnavailable,

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(err) if err.is_size_limit() => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::InvalidPath(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AmbiguousFileName { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match &self {
            AppError::Validation(_)
            | AppError::NotFound(_)
            | AppError::AmbiguousFileName { .. }
            | AppError::BadRequest(_)
            | AppError::PayloadTooLarge(_) => self.to_string(),
            AppError::InvalidPath(msg) => {
                tracing::warn!("Rejected storage path: {}", msg);
                "Invalid storage path".to_string()
            }
            AppError::ContextUnavailable => {
                tracing::error!("URL requested without a request context");
                "Unable to build file URL".to_string()
            }
            AppError::Archive(msg) => {
                tracing::error!("Archive error: {}", msg);
                "Failed to create archive".to_string()
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::TaskJoin(err) => {
                tracing::error!("Blocking task failed: {:?}", err);
                "Internal server error".to_string()
            }
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                "Internal server error".to_string()
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => AppError::IoError(io_err),
            other => AppError::Archive(other.to_string()),
        }
    }
}

impl From<::config::ConfigError> for AppError {
    fn from(err: ::config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
