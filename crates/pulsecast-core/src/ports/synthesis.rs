//! Speech synthesis port.
//!
//! The orchestrator calls this once per turn with the turn's text and voice.
//! Backends live in `pulsecast-stream`.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// A failure to synthesize one turn.
///
/// Always turn-scoped: the orchestrator reports it for the failing turn and
/// moves on to the next one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    /// The request could not be sent or the response could not be read.
    #[error("Synthesis request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("Synthesis service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not finish within the configured timeout.
    #[error("Synthesis timed out after {0} ms")]
    Timeout(u64),

    /// The service returned zero bytes of audio.
    #[error("Synthesis returned no audio")]
    EmptyAudio,

    /// The backend produced audio it could not encode.
    #[error("Failed to encode audio: {0}")]
    Encoding(String),

    /// The backend does not know the requested voice.
    #[error("Unknown voice: {0}")]
    UnknownVoice(String),
}

/// Turns text into encoded audio.
///
/// Implementations must be shareable across sessions; each HTTP session
/// holds an `Arc<dyn SpeechSynthesizer>`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice`, returning the complete encoded audio.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, SynthesisError>;

    /// MIME type of the audio this backend produces.
    fn mime_type(&self) -> &'static str {
        "audio/mpeg"
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
