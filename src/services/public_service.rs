//! Read-only projections of the current event.

use crate::{
    dto::snapshot::{Audience, EventSnapshot},
    error::ServiceError,
    state::SharedState,
};

/// Current event as seen by `audience`. Never writes.
pub async fn event_snapshot(
    state: &SharedState,
    audience: Audience,
) -> Result<EventSnapshot, ServiceError> {
    let snapshot = state.snapshot().await?;
    Ok(EventSnapshot::render(&snapshot, audience, state.now_ms()))
}
