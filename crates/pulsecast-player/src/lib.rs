#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod buffer;
pub mod error;
pub mod history;
pub mod manager;
pub mod output;
pub mod session;
pub mod sse;
pub mod timeline;
pub mod timer;

pub use buffer::{BufferedRange, MediaBuffer, MemoryMediaBuffer, UpdateEnd, UpdateEnds};
pub use error::{AppendError, PlaybackError, PlayerError};
pub use history::{HistoryEntry, HistoryLog};
pub use manager::{BufferManager, BufferState, CloseReason, StartTrigger};
pub use output::{ClockOutput, PlayOrigin, PlaybackOutput};
pub use session::{PlayerCommand, PlayerOutcome, PlayerSession, PlayerSnapshot, TurnFailure};
pub use sse::{SseEvent, SseLineParser, decode_event, decode_sse};
pub use timeline::{SeekResult, Timeline, TimelineDisplay, TimelineMode};
pub use timer::StartTimer;

#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio_stream as _;
