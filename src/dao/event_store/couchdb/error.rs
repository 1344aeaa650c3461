//! Failures of the CouchDB event store, grouped by the HTTP exchange that failed.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for CouchDB operations.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Request kinds issued against CouchDB, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouchAction {
    /// Probe or create the database.
    Database,
    /// Read one document.
    Read,
    /// Write one document.
    Write,
    /// Range scan over `_all_docs`.
    Scan,
}

impl std::fmt::Display for CouchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CouchAction::Database => "database probe",
            CouchAction::Read => "document read",
            CouchAction::Write => "document write",
            CouchAction::Scan => "document scan",
        };
        f.write_str(label)
    }
}

/// Failures that can occur while talking to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required setting is absent from the environment.
    #[error("missing CouchDB setting `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The HTTP client could not be built.
    #[error("failed to build the CouchDB HTTP client")]
    ClientBuilder {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },
    /// The request never reached CouchDB.
    #[error("CouchDB {action} of `{target}` could not be sent")]
    Transport {
        /// Request kind.
        action: CouchAction,
        /// Document or database addressed.
        target: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a status the store does not handle.
    #[error("CouchDB answered {status} to the {action} of `{target}`")]
    Status {
        /// Request kind.
        action: CouchAction,
        /// Document or database addressed.
        target: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// The response body was not JSON.
    #[error("CouchDB {action} of `{target}` returned an unreadable body")]
    Body {
        /// Request kind.
        action: CouchAction,
        /// Document or database addressed.
        target: String,
        /// Decoding error.
        #[source]
        source: reqwest::Error,
    },
    /// A stored document does not match the quiz model.
    #[error("document `{target}` does not match the quiz model")]
    Schema {
        /// Document identifier.
        target: String,
        /// Deserializer error.
        #[source]
        source: serde_json::Error,
    },
    /// The event document moved past the revision a mutation was computed from.
    #[error("event document is no longer at revision {expected} (found {found:?})")]
    RevisionMismatch {
        /// Revision the mutation was computed from.
        expected: u64,
        /// Revision stored, absent when no event exists.
        found: Option<u64>,
    },
}

impl CouchDaoError {
    pub(super) fn transport(action: CouchAction, target: &str) -> impl FnOnce(reqwest::Error) -> Self {
        let target = target.to_owned();
        move |source| CouchDaoError::Transport {
            action,
            target,
            source,
        }
    }

    pub(super) fn body(action: CouchAction, target: &str) -> impl FnOnce(reqwest::Error) -> Self {
        let target = target.to_owned();
        move |source| CouchDaoError::Body {
            action,
            target,
            source,
        }
    }

    pub(super) fn status(action: CouchAction, target: &str, status: StatusCode) -> Self {
        CouchDaoError::Status {
            action,
            target: target.to_owned(),
            status,
        }
    }
}
