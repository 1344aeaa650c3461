use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageProbe},
    state::SharedState,
};

/// Ping the storage backend and report the degraded flag alongside the result.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let probe = match state.event_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => StorageProbe::Reachable,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                StorageProbe::Unreachable
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            StorageProbe::Missing
        }
    };

    HealthResponse::new(state.is_degraded().await, probe)
}
