use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying remote store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or answered with a server-side failure.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend refused the request (constraint violation, unknown column...).
    #[error("storage rejected request: {message}")]
    Rejected { message: String },
    /// A row returned by the backend does not match the expected entity shape.
    #[error("malformed row in `{table}`")]
    Malformed {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejection error carrying the backend's explanation.
    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }
}
