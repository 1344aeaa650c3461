//! One read-compute-write unit: a freshly loaded copy of the event document
//! and its content that a round engine mutates before it is committed.

use crate::state::{
    clock::Millis,
    content::{ContentBook, Package, TeamProfile},
    event::EventState,
};

/// Mutable working copy handed to the round engines.
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// Event state being modified.
    pub event: EventState,
    /// Packages and questions available to the engines.
    pub content: ContentBook,
    /// Registered team roster.
    pub roster: Vec<TeamProfile>,
    revision: u64,
    original: Option<EventState>,
    now_ms: Millis,
}

/// Result of a draft that needs to be persisted.
#[derive(Debug, Clone)]
pub struct DraftChanges {
    /// Revision the draft was loaded from.
    pub base_revision: u64,
    /// New event state.
    pub event: EventState,
    /// Packages modified by the engines.
    pub packages: Vec<Package>,
}

impl EventDraft {
    /// Wrap a loaded document. `event` is `None` when no event exists yet, in
    /// which case a fresh one is created from the roster.
    pub fn load(
        revision: u64,
        event: Option<EventState>,
        roster: Vec<TeamProfile>,
        content: ContentBook,
        now_ms: Millis,
    ) -> Self {
        let original = event.clone();
        let event = event.unwrap_or_else(|| EventState::new(&roster, now_ms));
        Self {
            event,
            content,
            roster,
            revision,
            original,
            now_ms,
        }
    }

    /// Instant the mutation is evaluated at.
    pub fn now_ms(&self) -> Millis {
        self.now_ms
    }

    /// Revision of the document the draft was loaded from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the draft differs from what was loaded.
    pub fn is_dirty(&self) -> bool {
        self.content.has_changes() || self.original.as_ref() != Some(&self.event)
    }

    /// Consume the draft into what has to be written back.
    pub fn into_changes(self) -> DraftChanges {
        let mut event = self.event;
        event.updated_at_ms = self.now_ms;
        DraftChanges {
            base_revision: self.revision,
            event,
            packages: self.content.into_touched(),
        }
    }
}
