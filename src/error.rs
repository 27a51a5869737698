use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::identity::VoteClaimError,
};

/// Failures of session operations, independent of the transport.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The remote store failed the read or write.
    #[error("remote store request failed")]
    Store(#[source] StorageError),
    /// No remote store is connected yet.
    #[error("remote store not connected (degraded mode)")]
    Degraded,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The client already did this, or has the same request in flight.
    #[error("{0}")]
    Duplicate(String),
    #[error("session `{0}` not found")]
    SessionNotFound(String),
    /// The caller lacks the credential the operation requires.
    #[error("{0}")]
    Unauthorized(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Store(err)
    }
}

impl From<VoteClaimError> for ServiceError {
    fn from(err: VoteClaimError) -> Self {
        ServiceError::Duplicate(err.to_string())
    }
}

/// Errors rendered as HTTP responses with a JSON `{message}` body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing participant identity or facilitator token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Store unreachable or failing; the client may retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Duplicate(message) => AppError::Conflict(message),
            err @ ServiceError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
