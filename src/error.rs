use crate::models::{DeleteResult, ErrorResponse};
use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Errors a handler can report to the client. Every variant renders as
/// `{"success": false, "error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Server(String),
    #[error("failed to delete {failed} of {} files", .results.len())]
    DeletionFailed {
        failed: usize,
        results: Vec<DeleteResult>,
    },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Server(_) | ApiError::DeletionFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { .. } | StorageError::InvalidName(_) => {
                ApiError::Validation(err.to_string())
            }
            StorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StorageError::NameExhausted(_) | StorageError::Io(_) => {
                tracing::error!("Storage failure: {}", err);
                ApiError::Server("storage operation failed".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_string();
        let results = match self {
            ApiError::DeletionFailed { results, .. } => Some(results),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
                results,
            }),
        )
            .into_response()
    }
}
