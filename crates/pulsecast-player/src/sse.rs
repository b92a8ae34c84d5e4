//! Incremental Server-Sent Events decoding.
//!
//! Network reads split events at arbitrary byte boundaries; the parser
//! buffers partial lines and yields complete events only.

use std::collections::VecDeque;
use std::fmt::Display;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use pulsecast_core::StreamEvent;

use crate::error::PlayerError;

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseLineParser {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseLineParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.handle_line(&line) {
                out.push(event);
            }
        }
        out
    }

    /// End of input: dispatch whatever is left.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.handle_line(line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: self.event.take(),
            data,
            id: self.id.clone(),
        })
    }
}

/// Parse the JSON payload of an SSE event.
pub fn decode_event(event: &SseEvent) -> Result<StreamEvent, PlayerError> {
    StreamEvent::from_json(&event.data).map_err(|e| PlayerError::Decode(e.to_string()))
}

struct DecodeState<S> {
    body: S,
    parser: SseLineParser,
    ready: VecDeque<SseEvent>,
    finished: bool,
}

/// Turn an SSE response body into wire events.
///
/// A body error yields one [`PlayerError::Transport`] and ends the stream.
pub fn decode_sse<S, E>(body: S) -> impl Stream<Item = Result<StreamEvent, PlayerError>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let state = DecodeState {
        body,
        parser: SseLineParser::new(),
        ready: VecDeque::new(),
        finished: false,
    };
    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((decode_event(&event), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.parser.push(&bytes);
                    state.ready.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(PlayerError::Transport(err.to_string())), state));
                }
                None => {
                    state.finished = true;
                    let rest = state.parser.flush();
                    state.ready.extend(rest);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_split_across_reads() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"event: status\nda").is_empty());
        assert!(parser.push(b"ta: {\"type\":\"sta").is_empty());
        let events = parser.push(b"tus\",\"message\":\"hi\"}\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("status".to_string()),
                data: r#"{"type":"status","message":"hi"}"#.to_string(),
                id: None,
            }]
        );
    }

    #[test]
    fn comments_and_keep_alives_are_ignored() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b": keep-alive\n\n").is_empty());
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn flush_dispatches_trailing_event() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"data: tail").is_empty());
        assert_eq!(parser.flush().map(|e| e.data), Some("tail".to_string()));
        assert_eq!(parser.flush(), None);
    }

    #[test]
    fn bad_payload_is_a_decode_error() {
        let event = SseEvent {
            data: "{not json".to_string(),
            ..SseEvent::default()
        };
        assert!(matches!(decode_event(&event), Err(PlayerError::Decode(_))));
    }
}
