//! Canonical wire event union for all delivery transports.
//!
//! This module is the single source of truth for events sent from the
//! orchestrator to a listener, whether they travel over the in-process
//! channel, SSE or a WebSocket.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "status", "message": "Generating audio for turn 1/3", "progress": 0.0 }
//! { "type": "host", "host": 1 }
//! { "type": "audio", "data": "SUQzBAAAAAAAI1RTU0UAAAAP..." }
//! { "type": "segment_end", "turn": 0 }
//! ```

mod base64_bytes;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::{Chunk, Speaker};

/// Every event a delivery session can carry.
///
/// Each variant carries only its required payload. Consumers match on it
/// exhaustively, so adding a kind is a compile error everywhere it is not
/// handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Total turn count, sent once before any turn.
    Metadata {
        turns: usize,
    },

    /// Human-readable progress.
    Status {
        message: String,
        /// Percentage of turns started so far (0-100).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f32>,
    },

    /// Speaker of the turn whose audio follows.
    Host {
        host: Speaker,
    },

    /// One ordered audio chunk, base64 on the wire.
    Audio {
        #[serde(with = "base64_bytes")]
        data: Bytes,
    },

    /// All audio of `turn` has been sent.
    SegmentEnd {
        turn: usize,
    },

    /// The session finished normally. Always the last event.
    Complete {
        message: String,
    },

    /// A failure. With `turn` set it is scoped to that turn and the session
    /// continues; without it the session is over.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<usize>,
    },
}

impl StreamEvent {
    #[must_use]
    pub const fn metadata(turns: usize) -> Self {
        Self::Metadata { turns }
    }

    pub fn status(message: impl Into<String>, progress: Option<f32>) -> Self {
        Self::Status {
            message: message.into(),
            progress,
        }
    }

    #[must_use]
    pub const fn host(host: Speaker) -> Self {
        Self::Host { host }
    }

    #[must_use]
    pub fn audio(chunk: &Chunk) -> Self {
        Self::Audio {
            data: chunk.bytes.clone(),
        }
    }

    #[must_use]
    pub const fn segment_end(turn: usize) -> Self {
        Self::SegmentEnd { turn }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::Complete {
            message: message.into(),
        }
    }

    /// Turn-scoped, recoverable error.
    pub fn turn_error(turn: usize, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            turn: Some(turn),
        }
    }

    /// Session-scoped, fatal error.
    pub fn session_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            turn: None,
        }
    }

    /// Wire name of the event kind, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Metadata { .. } => "metadata",
            Self::Status { .. } => "status",
            Self::Host { .. } => "host",
            Self::Audio { .. } => "audio",
            Self::SegmentEnd { .. } => "segment_end",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether no further events may follow this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Error { turn: None, .. }
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
