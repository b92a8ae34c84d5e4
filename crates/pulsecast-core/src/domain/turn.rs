//! Dialogue turns and the speakers that voice them.

use serde::{Deserialize, Serialize};

/// One of the two hosts of an episode.
///
/// Serialized as the bare integer `1` or `2` to match the `host` wire event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Speaker {
    /// First host, voices every even-indexed turn.
    One,
    /// Second host, voices every odd-indexed turn.
    Two,
}

impl Speaker {
    /// Speaker for the turn at `index`, alternating by parity.
    #[must_use]
    pub const fn for_turn(index: usize) -> Self {
        if index % 2 == 0 { Self::One } else { Self::Two }
    }

    /// Wire number of this speaker.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for Speaker {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("host must be 1 or 2, got {other}")),
        }
    }
}

impl From<Speaker> for u8 {
    fn from(speaker: Speaker) -> Self {
        speaker.number()
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host {}", self.number())
    }
}

/// Processing status of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Not yet reached by the orchestrator.
    #[default]
    Pending,
    /// Waiting on the synthesis collaborator.
    Synthesizing,
    /// Audio chunks are being emitted.
    Streaming,
    /// All chunks and the `segment_end` marker were emitted.
    Done,
    /// Synthesis failed; an `error` event was emitted instead of audio.
    Failed,
}

impl TurnStatus {
    /// Whether the turn has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One line of dialogue attributed to a speaker.
///
/// `index` is assigned when the [`Script`](super::Script) is built and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub index: usize,
    pub speaker: Speaker,
    pub voice_id: String,
    pub text: String,
    pub status: TurnStatus,
}

impl Turn {
    #[must_use]
    pub fn new(
        index: usize,
        speaker: Speaker,
        voice_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            index,
            speaker,
            voice_id: voice_id.into(),
            text: text.into(),
            status: TurnStatus::Pending,
        }
    }
}
