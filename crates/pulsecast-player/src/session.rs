//! The player task.
//!
//! [`PlayerSession::run`] is the single cooperative loop on the client side.
//! It selects over the incoming wire events, append completions, the start
//! timer, user commands and a playback tick, and feeds each into the
//! [`BufferManager`] or the [`Timeline`]. Nothing else touches the buffer.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use pulsecast_core::{Chunk, PlayerSettings, StreamEvent};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::buffer::{MediaBuffer, MemoryMediaBuffer, UpdateEnds};
use crate::error::PlayerError;
use crate::history::HistoryLog;
use crate::manager::{BufferManager, BufferState, CloseReason, StartTrigger};
use crate::output::{ClockOutput, PlaybackOutput};
use crate::timeline::{Timeline, TimelineDisplay};

// ── Commands and reports ─────────────────────────────────────────────────────

/// User intent forwarded into a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    SetRate(f64),
    ScrubStart(f64),
    ScrubMove(f64),
    ScrubRelease(f64),
    /// Relative jump in seconds, negative for backwards.
    Skip(f64),
    ReturnToLive,
}

/// Published after every loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub state: &'static str,
    pub buffered_bytes: u64,
    pub pending_chunks: usize,
    pub timeline: TimelineDisplay,
    pub rate: f64,
    pub current_turn: usize,
    pub total_turns: Option<usize>,
}

/// A turn the server reported as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure {
    pub turn: usize,
    pub message: String,
}

/// How a session ended.
#[derive(Debug, Clone)]
pub struct PlayerOutcome {
    pub reason: CloseReason,
    pub history: HistoryLog,
    pub start_trigger: Option<StartTrigger>,
    pub evictions: usize,
    pub turn_errors: Vec<TurnFailure>,
    pub total_turns: Option<usize>,
    pub segments_completed: usize,
}

impl PlayerOutcome {
    /// `Ok` unless the session closed on an error or a lost transport.
    pub fn into_result(self) -> Result<Self, PlayerError> {
        match &self.reason {
            CloseReason::Fatal(err) => Err(err.clone()),
            CloseReason::TransportLost => Err(PlayerError::Transport(
                "stream ended before completion".to_string(),
            )),
            CloseReason::Stopped | CloseReason::Ended => Ok(self),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

pub struct PlayerSession<B, O> {
    manager: BufferManager<B, O>,
    updates: UpdateEnds,
    timeline: Timeline,
    snapshots: watch::Sender<PlayerSnapshot>,
    tick: Duration,
    exit_when_drained: bool,
    turn_cursor: usize,
    next_seq: usize,
    delivered_bytes: u64,
    total_turns: Option<usize>,
    turn_errors: Vec<TurnFailure>,
    segments_completed: usize,
}

impl PlayerSession<MemoryMediaBuffer, ClockOutput> {
    /// A session over the bundled in-memory buffer and clock output.
    pub fn in_memory(settings: PlayerSettings) -> Result<Self, PlayerError> {
        let (buffer, updates) = MemoryMediaBuffer::new(settings.buffer_capacity, settings.byte_rate);
        Self::new(buffer, updates, ClockOutput::new(), settings)
    }
}

impl<B: MediaBuffer, O: PlaybackOutput> PlayerSession<B, O> {
    /// `updates` must be the completion receiver belonging to `buffer`.
    pub fn new(
        buffer: B,
        updates: UpdateEnds,
        output: O,
        settings: PlayerSettings,
    ) -> Result<Self, PlayerError> {
        let timeline = Timeline::new(settings.live_edge_epsilon_secs);
        let tick = settings.tick();
        let manager = BufferManager::open(buffer, output, settings)?;
        let snapshot = Self::snapshot_of(&manager, &timeline, 0, None);
        let (snapshots, _) = watch::channel(snapshot);

        Ok(Self {
            manager,
            updates,
            timeline,
            snapshots,
            tick,
            exit_when_drained: false,
            turn_cursor: 0,
            next_seq: 0,
            delivered_bytes: 0,
            total_turns: None,
            turn_errors: Vec::new(),
            segments_completed: 0,
        })
    }

    /// Close as soon as the complete stream is buffered instead of waiting
    /// for playback to reach the end. Used when recording to a file.
    #[must_use]
    pub const fn exit_when_drained(mut self, exit: bool) -> Self {
        self.exit_when_drained = exit;
        self
    }

    /// Watch the session's state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.subscribe()
    }

    #[must_use]
    pub const fn manager(&self) -> &BufferManager<B, O> {
        &self.manager
    }

    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Drive the session until the buffer manager closes.
    ///
    /// The event stream is dropped before returning, which closes the
    /// delivery channel on every exit path.
    pub async fn run<S>(
        &mut self,
        events: S,
        mut commands: mpsc::Receiver<PlayerCommand>,
        cancel: CancellationToken,
    ) -> PlayerOutcome
    where
        S: Stream<Item = Result<StreamEvent, PlayerError>>,
    {
        let mut events = Box::pin(events);
        let mut events_open = true;
        let mut commands_open = true;
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.manager.state().is_closed() {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("Player cancelled");
                    self.manager.stop();
                }
                Some(update) = self.updates.recv() => self.manager.on_update_end(update),
                next = events.next(), if events_open => match next {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(PlayerError::Transport(reason))) => {
                        tracing::warn!(%reason, "Delivery channel failed");
                        events_open = false;
                        self.manager.on_transport_lost();
                    }
                    Some(Err(err)) => self.manager.fail(err),
                    None => {
                        events_open = false;
                        if !self.manager.is_stream_complete() {
                            self.manager.on_transport_lost();
                        }
                    }
                },
                () = self.manager.start_timer().fired() => self.manager.on_start_timeout(),
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
                _ = ticker.tick() => self.manager.on_tick(),
            }

            if self.exit_when_drained {
                self.manager.finish_if_drained();
            }
            self.publish();
        }

        drop(events);
        self.outcome()
    }

    // ── Event handling ───────────────────────────────────────────────────────

    fn handle_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Metadata { turns } => {
                tracing::info!(turns, "Stream started");
                self.total_turns = Some(turns);
            }
            StreamEvent::Status { message, progress } => {
                tracing::debug!(%message, ?progress, "Server status");
            }
            StreamEvent::Host { host } => {
                tracing::debug!(host = host.number(), turn = self.turn_cursor, "Turn starting");
                self.next_seq = 0;
            }
            StreamEvent::Audio { data } => {
                self.timeline.start(Instant::now());
                self.delivered_bytes += data.len() as u64;
                let chunk = Chunk::new(self.turn_cursor, self.next_seq, data);
                self.next_seq += 1;
                self.manager.receive_chunk(chunk);
            }
            StreamEvent::SegmentEnd { turn } => {
                if turn != self.turn_cursor {
                    tracing::warn!(turn, expected = self.turn_cursor, "Out-of-order segment end");
                }
                self.segments_completed += 1;
                self.advance_turn(turn);
            }
            StreamEvent::Complete { message } => {
                tracing::info!(%message, "Stream complete");
                self.manager.on_stream_complete();
                self.timeline.freeze_at(self.delivered_secs());
            }
            StreamEvent::Error {
                message,
                turn: Some(turn),
            } => {
                tracing::warn!(turn, %message, "Turn failed on server");
                self.turn_errors.push(TurnFailure { turn, message });
                self.advance_turn(turn);
            }
            StreamEvent::Error { message, turn: None } => {
                self.manager.fail(PlayerError::Protocol(message));
            }
        }
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        let now = Instant::now();
        match command {
            PlayerCommand::Play => self.manager.play(),
            PlayerCommand::Pause => self.manager.pause(),
            PlayerCommand::Stop => self.manager.stop(),
            PlayerCommand::SetRate(rate) => {
                let applied = self.manager.set_rate(rate);
                tracing::debug!(requested = rate, applied, "Playback rate changed");
            }
            PlayerCommand::ScrubStart(position) => self.timeline.scrub_start(now, position),
            PlayerCommand::ScrubMove(position) => self.timeline.scrub_move(now, position),
            PlayerCommand::ScrubRelease(position) => {
                let buffered = self.manager.restore_history(position);
                self.timeline
                    .release(now, position, buffered, self.manager.output_mut());
            }
            PlayerCommand::Skip(delta) => {
                let target = self.manager.output().position() + delta;
                let buffered = self.manager.restore_history(target);
                self.timeline
                    .skip(now, delta, buffered, self.manager.output_mut());
            }
            PlayerCommand::ReturnToLive => {
                let buffered = self.manager.buffered();
                self.timeline
                    .return_to_live(now, buffered, self.manager.output_mut());
            }
        }
    }

    fn advance_turn(&mut self, turn: usize) {
        self.turn_cursor = self.turn_cursor.max(turn + 1);
        self.next_seq = 0;
    }

    #[allow(clippy::cast_precision_loss)]
    fn delivered_secs(&self) -> f64 {
        self.delivered_bytes as f64 / f64::from(self.manager.settings().byte_rate.max(1))
    }

    // ── Reporting ────────────────────────────────────────────────────────────

    fn snapshot_of(
        manager: &BufferManager<B, O>,
        timeline: &Timeline,
        current_turn: usize,
        total_turns: Option<usize>,
    ) -> PlayerSnapshot {
        PlayerSnapshot {
            state: manager.state().name(),
            buffered_bytes: manager.buffered_bytes(),
            pending_chunks: manager.pending_len(),
            timeline: timeline.display(Instant::now(), manager.output().position()),
            rate: manager.output().rate(),
            current_turn,
            total_turns,
        }
    }

    fn publish(&self) {
        let snapshot =
            Self::snapshot_of(&self.manager, &self.timeline, self.turn_cursor, self.total_turns);
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn outcome(&mut self) -> PlayerOutcome {
        let reason = match self.manager.state() {
            BufferState::Closed(reason) => reason.clone(),
            _ => CloseReason::Stopped,
        };
        PlayerOutcome {
            reason,
            history: self.manager.take_history(),
            start_trigger: self.manager.start_trigger(),
            evictions: self.manager.evictions(),
            turn_errors: std::mem::take(&mut self.turn_errors),
            total_turns: self.total_turns,
            segments_completed: self.segments_completed,
        }
    }
}
