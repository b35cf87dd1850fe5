use crate::services::{ingest_service::UploadError, storage_service::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        } else {
            tracing::debug!(status = self.status.as_u16(), "{}", self.message);
        }

        let body = Json(json!({
            "ok": false,
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { .. } => Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
            StorageError::Body(msg) => Self::bad_request(format!("Malformed multipart body: {}", msg)),
            StorageError::Json(_) | StorageError::Io(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Storage(inner) => inner.into(),
            UploadError::FieldTooLong(ref field) => {
                tracing::warn!(field = %field, "text field over limit");
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            UploadError::UnsupportedMediaType {
                ref field,
                ref content_type,
            } => {
                tracing::warn!(field = %field, content_type = %content_type, "rejected non-image part");
                Self::bad_request(err.to_string())
            }
            UploadError::MissingPhoto | UploadError::UnexpectedField(_) | UploadError::Multipart(_) => {
                Self::bad_request(err.to_string())
            }
        }
    }
}
