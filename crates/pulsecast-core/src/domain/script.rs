//! Validated session input: ordered turn texts plus the voice rule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::turn::{Speaker, Turn};

/// Default voice for the first host.
pub const DEFAULT_HOST1_VOICE: &str = "nova";

/// Default voice for the second host.
pub const DEFAULT_HOST2_VOICE: &str = "onyx";

/// Upper bound on turns accepted for a single session.
pub const DEFAULT_MAX_TURNS: usize = 200;

/// Which synthesis voice each host speaks with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceAssignment {
    pub host1: String,
    pub host2: String,
}

impl Default for VoiceAssignment {
    fn default() -> Self {
        Self {
            host1: DEFAULT_HOST1_VOICE.to_string(),
            host2: DEFAULT_HOST2_VOICE.to_string(),
        }
    }
}

impl VoiceAssignment {
    #[must_use]
    pub fn voice_for(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::One => &self.host1,
            Speaker::Two => &self.host2,
        }
    }
}

/// Reasons a script is rejected before a session starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Script must contain at least one turn")]
    Empty,

    #[error("Turn {index} has no text")]
    BlankTurn { index: usize },

    #[error("Script has {count} turns, the limit is {max}")]
    TooManyTurns { count: usize, max: usize },

    #[error("Voice id for {0} must not be empty")]
    BlankVoice(Speaker),
}

/// An ordered, validated list of turns ready to be streamed.
///
/// Turn indices are contiguous from 0 and fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    turns: Vec<Turn>,
}

impl Script {
    /// Build a script from raw turn texts, assigning speakers by parity.
    pub fn from_lines<I, S>(lines: I, voices: &VoiceAssignment) -> Result<Self, ScriptError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_lines_with_limit(lines, voices, DEFAULT_MAX_TURNS)
    }

    /// Same as [`Script::from_lines`] with an explicit turn limit.
    pub fn from_lines_with_limit<I, S>(
        lines: I,
        voices: &VoiceAssignment,
        max_turns: usize,
    ) -> Result<Self, ScriptError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for speaker in [Speaker::One, Speaker::Two] {
            if voices.voice_for(speaker).trim().is_empty() {
                return Err(ScriptError::BlankVoice(speaker));
            }
        }

        let mut turns = Vec::new();
        for (index, line) in lines.into_iter().enumerate() {
            let text: String = line.into();
            if text.trim().is_empty() {
                return Err(ScriptError::BlankTurn { index });
            }
            let speaker = Speaker::for_turn(index);
            turns.push(Turn::new(index, speaker, voices.voice_for(speaker), text));
        }

        if turns.is_empty() {
            return Err(ScriptError::Empty);
        }
        if turns.len() > max_turns {
            return Err(ScriptError::TooManyTurns {
                count: turns.len(),
                max: max_turns,
            });
        }

        Ok(Self { turns })
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false for a constructed script; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}
