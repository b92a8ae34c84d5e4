//! Player error types.
//!
//! [`PlayerError`] is what a session closes with. [`AppendError`] and
//! [`PlaybackError`] are the errors of the [`MediaBuffer`](crate::MediaBuffer)
//! and [`PlaybackOutput`](crate::PlaybackOutput) seams.

/// Errors surfaced by the player.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// The buffer stayed full after evicting old audio and retrying once.
    #[error("Media buffer overflow: {0}")]
    BufferOverflow(AppendError),

    /// The buffer refused an append for a reason other than capacity.
    #[error("Media buffer rejected append: {0}")]
    Append(AppendError),

    /// The buffer or output cannot decode the stream's format.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The output refused to start without a user gesture.
    #[error("Playback blocked until user interaction")]
    PlaybackBlocked,

    /// The server ended the session with an error.
    #[error("Stream failed: {0}")]
    Protocol(String),

    /// The delivery channel failed.
    #[error("Transport failed: {0}")]
    Transport(String),

    /// A wire event or audio payload could not be decoded.
    #[error("Failed to decode stream event: {0}")]
    Decode(String),
}

/// Errors from [`MediaBuffer::append`](crate::MediaBuffer::append).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppendError {
    /// Not enough room for the chunk.
    #[error("quota exceeded: {requested} bytes requested, {free} free")]
    QuotaExceeded { requested: usize, free: usize },

    /// The buffer was never opened or has been released.
    #[error("buffer is not open")]
    NotOpen,

    /// A previous append has not completed yet.
    #[error("an append is already in progress")]
    Busy,

    /// More audio was put back in front than had been evicted.
    #[error("cannot restore {requested} bytes, only {evicted} were evicted")]
    RestoreOverrun { requested: usize, evicted: u64 },
}

/// Errors from [`PlaybackOutput::play`](crate::PlaybackOutput::play).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// Autoplay policy refused to start playback.
    #[error("playback requires a user gesture")]
    Blocked,

    /// The output cannot play this media.
    #[error("output cannot play {0}")]
    Unsupported(String),
}

impl From<PlaybackError> for PlayerError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Blocked => Self::PlaybackBlocked,
            PlaybackError::Unsupported(mime) => Self::UnsupportedFormat(mime),
        }
    }
}
