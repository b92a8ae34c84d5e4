//! Delivery port: where the orchestrator pushes its events.

use async_trait::async_trait;
use thiserror::Error;

use crate::events::StreamEvent;

/// The delivery channel to the listener is gone.
///
/// Always fatal to the session. There is no replay: a listener that wants
/// the episode again must start a new session from turn 0.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The listener side went away.
    #[error("Listener disconnected")]
    Disconnected,

    /// The sending side already closed the channel.
    #[error("Delivery channel is closed")]
    Closed,
}

/// Ordered, at-most-once push of events to exactly one listener.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Send one event, waiting for capacity if the listener is slow.
    async fn send(&self, event: StreamEvent) -> Result<(), TransportError>;

    /// Close the channel. Later sends fail with [`TransportError::Closed`].
    fn close(&self);

    /// Whether a send could still succeed.
    fn is_open(&self) -> bool;
}

/// A sink that accepts and discards every event.
///
/// Useful for dry runs where only the session report matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn send(&self, _event: StreamEvent) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&self) {}

    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn noop_sink_accepts_everything() {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        sink.send(StreamEvent::metadata(1)).await.unwrap();
        sink.close();
        assert!(sink.is_open());
    }
}
