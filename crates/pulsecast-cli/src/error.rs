//! CLI-specific error types and exit codes.

use pulsecast_core::SettingsError;
use pulsecast_player::PlayerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or input validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server could not be reached or rejected the request.
    #[error("Server error: {0}")]
    Server(String),

    /// The player closed on an error.
    #[error("Playback failed: {0}")]
    Player(#[from] PlayerError),
}

impl CliError {
    /// Map error to an exit code following sysexits.h.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 64, // EX_USAGE
            Self::Io(_) => 74,        // EX_IOERR
            Self::Config(_) => 78,    // EX_CONFIG
            Self::Server(_) => 69,    // EX_UNAVAILABLE
            Self::Player(_) => 1,
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        Self::Server(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 64);
        assert_eq!(CliError::from(SettingsError::BlankVoice).exit_code(), 78);
        assert_eq!(
            CliError::from(std::io::Error::other("disk full")).exit_code(),
            74
        );
    }
}
