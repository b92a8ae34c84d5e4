//! Server-side session state for one delivery of a script.

use serde::{Deserialize, Serialize};

use super::script::Script;
use super::turn::{Turn, TurnStatus};

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    /// Every turn reached a terminal status and `complete` was emitted.
    Complete,
    /// The session failed for a reason other than the listener leaving.
    Error,
    /// The delivery channel broke or the session was cancelled.
    Cancelled,
}

impl SessionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }
}

/// State of one streaming session, exclusively owned by the orchestrator.
///
/// The cursor only moves forward: [`StreamSession::advance`] is the only way
/// to change it and it refuses to move past a turn that is not terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSession {
    turns: Vec<Turn>,
    cursor: usize,
    total_bytes_emitted: u64,
    state: SessionState,
}

impl StreamSession {
    #[must_use]
    pub fn new(script: Script) -> Self {
        Self {
            turns: script.into_turns(),
            cursor: 0,
            total_bytes_emitted: 0,
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn total_bytes_emitted(&self) -> u64 {
        self.total_bytes_emitted
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn total_turns(&self) -> usize {
        self.turns.len()
    }

    /// The turn under the cursor, if any remain.
    #[must_use]
    pub fn current(&self) -> Option<&Turn> {
        self.turns.get(self.cursor)
    }

    /// Progress percentage reported before the current turn starts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f32 {
        if self.turns.is_empty() {
            return 100.0;
        }
        (self.cursor as f32 / self.turns.len() as f32) * 100.0
    }

    /// Move from `Idle` to `Streaming`. No-op in any other state.
    pub fn begin(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Streaming;
        }
    }

    /// Update the status of the turn under the cursor.
    pub fn set_current_status(&mut self, status: TurnStatus) {
        if let Some(turn) = self.turns.get_mut(self.cursor) {
            turn.status = status;
        }
    }

    /// Account for bytes that were handed to the delivery channel.
    pub fn record_emitted(&mut self, bytes: usize) {
        self.total_bytes_emitted += bytes as u64;
    }

    /// Advance the cursor past the current turn.
    ///
    /// Returns `false` (and leaves the cursor alone) when the current turn has
    /// not reached a terminal status or there is nothing left to advance over.
    pub fn advance(&mut self) -> bool {
        match self.turns.get(self.cursor) {
            Some(turn) if turn.status.is_terminal() => {
                self.cursor += 1;
                true
            }
            _ => false,
        }
    }

    /// Whether the cursor has passed the last turn.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.turns.len()
    }

    /// Number of turns that ended in [`TurnStatus::Failed`].
    #[must_use]
    pub fn failed_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.status == TurnStatus::Failed)
            .count()
    }

    pub fn complete(&mut self) {
        self.finish(SessionState::Complete);
    }

    pub fn cancel(&mut self) {
        self.finish(SessionState::Cancelled);
    }

    pub fn fail(&mut self) {
        self.finish(SessionState::Error);
    }

    fn finish(&mut self, state: SessionState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }
}
