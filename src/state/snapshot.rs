use serde::Serialize;

use crate::state::{
    content::{ContentBook, Package, Question},
    event::EventState,
};

/// Consistent read of the event document and the content it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Revision the snapshot was taken at; 0 before the first commit.
    pub revision: u64,
    /// Event state at that revision.
    pub event: EventState,
    /// Packages ordered by round then number.
    pub packages: Vec<Package>,
    /// Question currently on screen, if any.
    pub current_question: Option<Question>,
}

impl StateSnapshot {
    /// Capture a snapshot from a loaded or freshly committed state.
    pub fn capture(revision: u64, event: &EventState, content: &ContentBook) -> Self {
        let mut packages: Vec<Package> = content.packages().cloned().collect();
        packages.sort_by_key(|package| (package.round, package.number));
        let current_question = event
            .current_question()
            .and_then(|id| content.question(id).ok())
            .cloned();
        Self {
            revision,
            event: event.clone(),
            packages,
            current_question,
        }
    }
}
