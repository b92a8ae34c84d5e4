//! In-process delivery channel between the orchestrator and one transport.
//!
//! A bounded `tokio::sync::mpsc` channel wrapped so that the sending half
//! implements [`EventSink`] and the receiving half implements [`Stream`].
//! Sends wait for capacity; events are never dropped while the channel is
//! open.

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use pulsecast_core::{EventSink, StreamEvent, TransportError};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Create a connected sender/receiver pair holding at most `capacity`
/// undelivered events.
#[must_use]
pub fn delivery_channel(capacity: usize) -> (DeliverySender, DeliveryReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DeliverySender {
            tx: Mutex::new(Some(tx)),
        },
        DeliveryReceiver { rx, guard: None },
    )
}

// ── Sender ───────────────────────────────────────────────────────────────────

/// Orchestrator side of the channel.
#[derive(Debug)]
pub struct DeliverySender {
    tx: Mutex<Option<mpsc::Sender<StreamEvent>>>,
}

impl DeliverySender {
    fn current(&self) -> Option<mpsc::Sender<StreamEvent>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventSink for DeliverySender {
    async fn send(&self, event: StreamEvent) -> Result<(), TransportError> {
        let tx = self.current().ok_or(TransportError::Closed)?;
        tx.send(event)
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    fn close(&self) {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_open(&self) -> bool {
        self.current().is_some_and(|tx| !tx.is_closed())
    }
}

// ── Receiver ─────────────────────────────────────────────────────────────────

/// Transport side of the channel.
///
/// Yields events in send order and ends once the sender is closed or
/// dropped and every buffered event has been read.
#[derive(Debug)]
pub struct DeliveryReceiver {
    rx: mpsc::Receiver<StreamEvent>,
    guard: Option<DropGuard>,
}

impl DeliveryReceiver {
    /// Cancel `token` when this receiver is dropped.
    ///
    /// Transports attach the session's token here so that a listener going
    /// away stops the orchestrator even between sends.
    #[must_use]
    pub fn cancel_on_drop(mut self, token: CancellationToken) -> Self {
        self.guard = Some(token.drop_guard());
        self
    }

    /// Receive the next event, or `None` once the channel has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Refuse further events. Buffered events can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for DeliveryReceiver {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[tokio::test]
    async fn preserves_send_order() {
        let (tx, rx) = delivery_channel(8);
        for turn in 0..5 {
            tx.send(StreamEvent::segment_end(turn)).await.unwrap();
        }
        tx.close();

        let received: Vec<StreamEvent> = rx.collect().await;
        let expected: Vec<StreamEvent> = (0..5).map(StreamEvent::segment_end).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn send_after_receiver_drop_is_disconnected() {
        let (tx, rx) = delivery_channel(8);
        drop(rx);
        assert!(!tx.is_open());
        assert_eq!(
            tx.send(StreamEvent::metadata(1)).await,
            Err(TransportError::Disconnected)
        );
    }

    #[tokio::test]
    async fn send_after_close_is_closed() {
        let (tx, mut rx) = delivery_channel(8);
        tx.send(StreamEvent::metadata(1)).await.unwrap();
        tx.close();
        assert_eq!(
            tx.send(StreamEvent::metadata(2)).await,
            Err(TransportError::Closed)
        );
        assert_eq!(rx.recv().await, Some(StreamEvent::metadata(1)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn full_channel_applies_back_pressure() {
        let (tx, mut rx) = delivery_channel(1);
        tx.send(StreamEvent::metadata(1)).await.unwrap();

        let mut pending = task::spawn(tx.send(StreamEvent::metadata(2)));
        assert_pending!(pending.poll());

        assert_eq!(rx.recv().await, Some(StreamEvent::metadata(1)));
        assert!(pending.is_woken());
        assert_ready_ok!(pending.poll());
    }

    #[tokio::test]
    async fn dropping_receiver_cancels_attached_token() {
        let token = CancellationToken::new();
        let (_tx, rx) = delivery_channel(1);
        let rx = rx.cancel_on_drop(token.clone());
        assert!(!token.is_cancelled());
        drop(rx);
        assert!(token.is_cancelled());
    }
}
