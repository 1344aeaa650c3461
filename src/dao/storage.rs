use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

type BackendError = Box<dyn Error + Send + Sync>;

/// Backend-neutral storage failure. Only these two outcomes matter to the
/// mutation unit: retry on a conflict, degrade on anything else.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or returned an error.
    #[error("{backend} store unavailable: {source}")]
    Unavailable {
        /// Short backend name, e.g. `mongo`.
        backend: &'static str,
        /// Backend specific cause.
        #[source]
        source: BackendError,
    },
    /// Another writer committed first.
    #[error("event document is past revision {expected} (now at {found:?})")]
    Conflict {
        /// Revision the writer read.
        expected: u64,
        /// Revision actually stored, when the backend reports it.
        found: Option<u64>,
    },
}

impl StorageError {
    /// Wrap a backend failure.
    pub fn unavailable(backend: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            backend,
            source: Box::new(source),
        }
    }

    /// Revision mismatch detected by a conditional write.
    pub fn conflict(expected: u64, found: Option<u64>) -> Self {
        StorageError::Conflict { expected, found }
    }

    /// Whether a fresh read and retry can resolve this failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("socket closed")]
    struct SocketClosed;

    #[test]
    fn unavailable_names_the_backend_and_cause() {
        let err = StorageError::unavailable("couch", SocketClosed);
        assert_eq!(err.to_string(), "couch store unavailable: socket closed");
        assert!(!err.is_conflict());
        assert!(StorageError::conflict(3, Some(4)).is_conflict());
    }
}
