use serde::{Deserialize, Serialize};

use crate::state::{
    content::{Package, Question, TeamProfile},
    event::EventState,
};

/// Persisted singleton event document guarded by a monotonically increasing revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDocument {
    /// Revision of this copy; the first commit writes revision 1.
    pub revision: u64,
    /// Authoritative event state.
    pub state: EventState,
}

/// Everything one mutation writes, applied atomically by the store.
#[derive(Debug, Clone)]
pub struct EventCommit {
    /// Revision the mutation was computed from; 0 when no document existed.
    pub expected_revision: u64,
    /// Document replacing the stored one.
    pub document: EventDocument,
    /// Packages whose play progress changed.
    pub packages: Vec<Package>,
}

/// Pre-provisioned content seeded into an empty store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBundle {
    /// Registered teams in display order.
    #[serde(default)]
    pub teams: Vec<TeamProfile>,
    /// Packages of every round.
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Questions of every package.
    #[serde(default)]
    pub questions: Vec<Question>,
}
