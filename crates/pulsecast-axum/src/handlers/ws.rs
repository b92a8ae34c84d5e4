//! WebSocket delivery of podcast sessions.
//!
//! `GET /api/podcast/ws` upgrades to a text WebSocket.
//!
//! ## Protocol
//!
//! | Direction | Frame | Content |
//! |---|---|---|
//! | Client → Server | Text, once | `{"script": [...], "voices"?: {"host1", "host2"}}` |
//! | Server → Client | Text, per event | One wire event as JSON |
//!
//! The server closes the socket after `complete` or a session-scoped
//! `error`. A client close cancels the session.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pulsecast_core::StreamEvent;
use tracing::{debug, info, warn};

use super::stream::{StreamRequest, start_session};
use crate::error::HttpError;
use crate::state::AppState;

/// `GET /api/podcast/ws`
pub async fn podcast_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_podcast_ws(socket, state))
}

async fn handle_podcast_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let Some(request) = read_request(&mut receiver).await else {
        info!("WebSocket closed before a script was sent");
        return;
    };

    let request = match request {
        Ok(request) => request,
        Err(message) => {
            finish(&mut sender, Some(StreamEvent::session_error(message))).await;
            return;
        }
    };

    let events = match start_session(&state, request.script, request.voices) {
        Ok(events) => events,
        Err(HttpError::BadRequest(message) | HttpError::Internal(message)) => {
            finish(&mut sender, Some(StreamEvent::session_error(message))).await;
            return;
        }
    };
    let mut events = Box::pin(events);

    info!("WebSocket podcast session opened");

    // Forward events until the session ends or the client goes away.
    loop {
        tokio::select! {
            next = events.next() => {
                let Some(event) = next else { break };
                let terminal = event.is_terminal();
                if !send_event(&mut sender, &event).await {
                    warn!("WebSocket send failed, dropping session");
                    break;
                }
                if terminal {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => {
                    info!("WebSocket client disconnected");
                    break;
                }
                // Ignore anything else the client sends mid-session.
                Some(Ok(_)) => {}
            }
        }
    }

    // Dropping the event stream cancels the session if it is still running.
    drop(events);
    finish(&mut sender, None).await;
    info!("WebSocket podcast session closed");
}

/// Wait for the request frame. `None` when the client left first.
async fn read_request(
    receiver: &mut SplitStream<WebSocket>,
) -> Option<Result<StreamRequest, String>> {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                return Some(
                    serde_json::from_str::<StreamRequest>(text.as_str())
                        .map_err(|_| "Invalid script format".to_string()),
                );
            }
            Ok(Message::Binary(_)) => {
                return Some(Err("Expected a JSON text frame".to_string()));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            // Ignore ping/pong frames.
            Ok(_) => {}
        }
    }
    None
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &StreamEvent) -> bool {
    match event.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            true
        }
    }
}

async fn finish(sender: &mut SplitSink<WebSocket, Message>, last: Option<StreamEvent>) {
    if let Some(event) = last {
        send_event(sender, &event).await;
    }
    if let Err(e) = sender.send(Message::Close(None)).await {
        debug!("Failed to send close frame: {}", e);
    }
}
