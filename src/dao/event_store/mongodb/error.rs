//! Failures of the MongoDB event store.

use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// What the store was doing to a collection when the driver failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOp {
    /// Query or cursor iteration.
    Read,
    /// Insert, update or upsert.
    Write,
    /// Index creation at startup.
    Index,
}

impl std::fmt::Display for CollectionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CollectionOp::Read => "read",
            CollectionOp::Write => "write",
            CollectionOp::Index => "index",
        })
    }
}

/// Direction of a JSON body conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyDirection {
    /// Model to stored JSON.
    Encode,
    /// Stored JSON to model.
    Decode,
}

/// Failures that can occur while talking to MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required setting is absent from the environment.
    #[error("missing MongoDB setting `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The connection string failed to parse.
    #[error("MongoDB connection string `{uri}` is invalid")]
    InvalidUri {
        /// Rejected connection string.
        uri: String,
        /// Parser error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed options.
    #[error("MongoDB client could not be created")]
    Client {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Every ping of the connection check failed.
    #[error("MongoDB did not answer a ping ({attempts} attempt(s))")]
    Unreachable {
        /// Pings sent before giving up.
        attempts: u32,
        /// Error of the last ping.
        #[source]
        source: MongoError,
    },
    /// A driver call against a collection failed.
    #[error("MongoDB {op} on `{collection}` failed")]
    Collection {
        /// What was attempted.
        op: CollectionOp,
        /// Collection name.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The conditional update matched no document.
    #[error("event document is no longer at revision {expected}")]
    RevisionMismatch {
        /// Revision the mutation was computed from.
        expected: u64,
    },
    /// A JSON body could not be converted.
    #[error("body of `{id}` failed to {direction:?}")]
    Body {
        /// Document identifier.
        id: String,
        /// Conversion that failed.
        direction: BodyDirection,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
}

impl MongoDaoError {
    /// Adapter for `map_err` on driver calls against a collection.
    pub(super) fn on(op: CollectionOp, collection: &'static str) -> impl FnOnce(MongoError) -> Self {
        move |source| MongoDaoError::Collection {
            op,
            collection,
            source,
        }
    }
}
