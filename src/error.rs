use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // Client errors, surfaced before any mutation
    #[error("the provided path is not valid: {0}")]
    InvalidPath(String),

    #[error("the provided name is not valid: {0:?}")]
    InvalidName(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("directory {0} is not empty")]
    DirectoryNotEmpty(String),

    // Server errors
    #[error("failed to persist metadata: {0}")]
    MetadataWriteFailed(String),

    #[error("failed to enqueue fragment {sequence} of {file_id}: {reason}")]
    EnqueueFailed {
        file_id: String,
        sequence: u64,
        reason: String,
    },

    #[error("fragment unavailable at {locator}: {reason}")]
    FragmentUnavailable { locator: String, reason: String },

    #[error("timed out while {0}")]
    Timeout(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPath(_)
            | Self::InvalidName(_)
            | Self::BadRequest(_)
            | Self::NotADirectory(_)
            | Self::IsADirectory(_)
            | Self::AlreadyExists(_)
            | Self::DirectoryNotEmpty(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// For errors raised while reading fragments: a stalled fragment becomes
    /// `Timeout`, anything else stays an io error.
    pub fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            Self::Timeout(format!("reading fragments: {err}"))
        } else {
            Self::Io(err)
        }
    }

    /// Client errors are reported verbatim, everything else is masked.
    fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "an internal server error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<AppError> for io::Error {
    fn from(err: AppError) -> Self {
        let kind = match &err {
            AppError::NotFound(_) => io::ErrorKind::NotFound,
            AppError::Timeout(_) => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        match err {
            AppError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Generating response for AppError: {:?}", self);

        let status_code = self.status_code();
        (status_code, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
