/// CouchDB backend over its HTTP API.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-process backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{ContentBundle, EventCommit, EventDocument},
        storage::StorageResult,
    },
    state::content::{Package, Question, TeamProfile},
};

pub use memory::MemoryEventStore;

/// Abstraction over the persistence layer holding the event document and its content.
pub trait EventStore: Send + Sync {
    /// Load the current event document, if one was ever committed.
    fn load_event(&self) -> BoxFuture<'static, StorageResult<Option<EventDocument>>>;
    /// Persist a mutation, failing with `StorageError::Conflict` when the stored
    /// revision differs from `commit.expected_revision`.
    fn commit(&self, commit: EventCommit) -> BoxFuture<'static, StorageResult<()>>;
    /// Registered teams in display order.
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamProfile>>>;
    /// Every package with its play progress.
    fn list_packages(&self) -> BoxFuture<'static, StorageResult<Vec<Package>>>;
    /// Every question.
    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>>;
    /// Insert content not present yet. Existing entries are left untouched.
    fn seed(&self, content: ContentBundle) -> BoxFuture<'static, StorageResult<()>>;
    /// Ping the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish a dropped connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
