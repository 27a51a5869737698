mod config;
mod error;
mod store;

pub use config::RestConfig;
pub use error::RestDaoError;
pub use store::RestStore;

use crate::dao::storage::StorageError;

impl From<RestDaoError> for StorageError {
    fn from(err: RestDaoError) -> Self {
        match err {
            RestDaoError::Rejected { path, status, body } => {
                StorageError::rejected(format!("{path} answered {status}: {body}"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
