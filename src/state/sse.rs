use tokio::sync::broadcast;
use tracing::trace;

use crate::dto::sse::ServerEvent;

/// Fan-out point for the event stream. Slow subscribers lag and skip frames.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub buffering up to `capacity` frames per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::Sender::new(capacity),
        }
    }

    /// New receiver seeing frames sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Deliver `frame` to the current subscribers and return how many there were.
    pub fn broadcast(&self, frame: ServerEvent) -> usize {
        let name = frame.name;
        let delivered = self.sender.send(frame).unwrap_or(0);
        trace!(event = name, delivered, "frame broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &'static str) -> ServerEvent {
        ServerEvent {
            name,
            data: "{}".into(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_frame() {
        let hub = SseHub::new(4);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.broadcast(frame("ping")), 2);
        assert_eq!(first.recv().await.unwrap().name, "ping");
        assert_eq!(second.recv().await.unwrap().name, "ping");
    }

    #[test]
    fn frames_without_subscribers_are_dropped() {
        let hub = SseHub::new(4);
        assert_eq!(hub.broadcast(frame("ping")), 0);
    }
}
