mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchEventStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::RevisionMismatch { expected, found } => {
                StorageError::conflict(expected, found)
            }
            other => StorageError::unavailable("couch", other),
        }
    }
}
