use serde::Serialize;
use utoipa::ToSchema;

/// Reachability of the storage backend as seen by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageProbe {
    /// The backend answered the ping.
    Reachable,
    /// A backend is installed but the ping failed.
    Unreachable,
    /// No backend is installed yet.
    Missing,
}

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Result of the storage ping.
    pub storage: StorageProbe,
}

impl HealthResponse {
    /// Build the response from the degraded flag and the probe result.
    pub fn new(degraded: bool, storage: StorageProbe) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_owned(),
            storage,
        }
    }
}
