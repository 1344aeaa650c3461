use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::state::clock::Millis;

/// Health check payload.
pub mod health;
/// Quiz master requests.
pub mod operator;
/// Event views rendered per audience.
pub mod snapshot;
/// Event stream frames.
pub mod sse;
/// Team device requests.
pub mod team;
/// Custom request validators.
pub mod validation;

fn format_millis(ms: Millis) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
