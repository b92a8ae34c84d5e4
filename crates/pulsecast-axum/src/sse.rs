//! Session event streams and their SSE encoding.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use pulsecast_core::StreamEvent;
use pulsecast_stream::StreamHandle;
use tokio_stream::StreamExt;
use uuid::Uuid;

/// Interval between keep-alive comments on an idle SSE response.
pub const KEEP_ALIVE_SECS: u64 = 15;

/// The events of one running session.
///
/// Once the orchestrator's channel ends, the session task is joined. If the
/// task died instead of finishing, a session-scoped `error` event is
/// appended so the listener does not mistake the cut for a transport drop.
pub fn session_events(
    handle: StreamHandle,
    session_id: Uuid,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    let StreamHandle { events, task } = handle;

    let tail = stream::once(async move {
        match task.await {
            Ok(report) => {
                tracing::info!(
                    session = %session_id,
                    state = ?report.state(),
                    failed_turns = report.failed_turns(),
                    bytes = report.total_bytes(),
                    elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                    "Session finished"
                );
                None
            }
            Err(err) => {
                tracing::error!(session = %session_id, error = %err, "Session task failed");
                Some(StreamEvent::session_error(format!("Streaming error: {err}")))
            }
        }
    })
    .filter_map(|event| event);

    events.chain(tail)
}

/// Encode session events as an SSE response, one JSON event per message.
pub fn sse_response<S>(events: S) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let stream = events.filter_map(|event| match event.to_json() {
        Ok(json) => Some(Ok(Event::default().event(event.kind()).data(json))),
        Err(e) => {
            tracing::warn!("Failed to serialize event: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}
