//! Periodic pass applying expired question, package and steal timers.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    state::{MutationMode, SharedState, transitions::mutate_with_broadcast},
};

/// Tick period of the background reconciler.
pub const RECONCILE_INTERVAL: Duration = Duration::from_millis(500);

/// Apply expiries once. Returns whether anything was written.
pub async fn reconcile_once(state: &SharedState) -> Result<bool, ServiceError> {
    // The mutation unit reconciles before running the closure; nothing else to do.
    let mutation =
        mutate_with_broadcast(state, MutationMode::RequireExisting, |_, _| Ok(())).await?;
    if mutation.changed {
        debug!(
            revision = mutation.snapshot.revision,
            phase = mutation.snapshot.event.round.phase_name(),
            "expired timers applied"
        );
    }
    Ok(mutation.changed)
}

/// Run [`reconcile_once`] forever.
pub async fn run(state: SharedState) {
    let mut ticker = interval(RECONCILE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match reconcile_once(&state).await {
            Ok(_) => {}
            Err(ServiceError::NotFound(_)) | Err(ServiceError::Degraded) => {}
            Err(err) => warn!(error = %err, "timer reconciliation failed"),
        }
    }
}
