use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dto::{
        snapshot::{Audience, EventSnapshot},
        sse::{ServerEvent, SystemStatus},
    },
    state::{SharedState, StateSnapshot},
};

pub(crate) const EVENT_SNAPSHOT: &str = "snapshot";
pub(crate) const EVENT_SYSTEM_STATUS: &str = "system.status";
pub(crate) const EVENT_HANDSHAKE: &str = "handshake";

/// Publish the public projection of a committed state. Never fails: a payload
/// that cannot be serialized is logged and dropped.
pub fn broadcast_snapshot(state: &SharedState, snapshot: &StateSnapshot) {
    let payload = EventSnapshot::render(snapshot, Audience::Public, state.now_ms());
    debug!(revision = snapshot.revision, "broadcasting snapshot");
    send_event(state, EVENT_SNAPSHOT, &payload);
}

/// Tell subscribers whether storage is reachable.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Forward degraded-mode flips to the SSE stream until the state is dropped.
pub async fn relay_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        broadcast_system_status(&state, degraded);
    }
}

fn send_event(state: &SharedState, event: &'static str, payload: &impl Serialize) {
    match ServerEvent::json(event, payload) {
        Ok(frame) => {
            state.sse().broadcast(frame);
        }
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
