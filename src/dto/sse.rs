use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

/// One named frame on the event stream. The JSON body is serialized once and
/// shared by every subscriber.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// SSE event name.
    pub name: &'static str,
    /// Serialized JSON payload.
    pub data: Arc<str>,
}

impl ServerEvent {
    /// Frame carrying `payload` as JSON.
    pub fn json<T: Serialize>(name: &'static str, payload: &T) -> serde_json::Result<Self> {
        let data = serde_json::to_string(payload)?;
        Ok(Self {
            name,
            data: data.into(),
        })
    }
}

/// Greeting sent to a new subscriber before any broadcast.
#[derive(Debug, Serialize, ToSchema)]
pub struct Handshake {
    /// Human readable greeting.
    pub message: String,
    /// Set while no storage backend is installed.
    pub degraded: bool,
}

/// Emitted on every degraded-mode transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatus {
    /// Current degraded flag.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_serialized_once_into_the_frame() {
        let frame = ServerEvent::json("system.status", &SystemStatus { degraded: true }).unwrap();
        assert_eq!(frame.name, "system.status");
        assert_eq!(&*frame.data, r#"{"degraded":true}"#);
    }
}
