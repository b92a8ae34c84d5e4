//! Stream-side error types.

use pulsecast_core::{ScriptError, SettingsError, TransportError};

/// Errors that stop or prevent a streaming session.
///
/// Per-turn synthesis failures are not here: they are reported on the wire
/// and the session carries on.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StreamError {
    /// The script was rejected before the session started.
    #[error("Invalid script: {0}")]
    Script(#[from] ScriptError),

    /// Orchestrator settings failed validation.
    #[error("Invalid stream settings: {0}")]
    Settings(#[from] SettingsError),

    /// The delivery channel broke mid-session.
    #[error("Delivery failed: {0}")]
    Transport(#[from] TransportError),

    /// The session's cancellation token fired.
    #[error("Session cancelled")]
    Cancelled,
}

impl StreamError {
    /// Whether this error ended a running session (as opposed to preventing one).
    #[must_use]
    pub const fn is_interruption(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled)
    }
}
