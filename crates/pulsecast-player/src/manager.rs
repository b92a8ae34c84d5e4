//! Buffer manager: the client-side buffering state machine.
//!
//! Receives chunks in order, feeds them into a [`MediaBuffer`] with at most
//! one append in flight, and decides when the [`PlaybackOutput`] may start.
//!
//! # States
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `Empty` | first chunk | `Buffering` (start timer armed) |
//! | `Buffering` | buffered bytes reach the threshold, or the start timer fires with data buffered | `Playing` |
//! | `Buffering` | output refuses autoplay | `AwaitingGesture` |
//! | `AwaitingGesture` | user `play` | `Playing` |
//! | `Playing` | playhead reaches the buffered end while more is coming | `Starved` |
//! | `Starved` | more data buffered | `Playing` |
//! | any | stop, end of stream, fatal error, lost transport | `Closed` |
//!
//! The manager is synchronous. Whoever owns it (normally a
//! [`PlayerSession`](crate::PlayerSession)) forwards update completions,
//! timer expiry and playback ticks into it.

use std::collections::VecDeque;

use pulsecast_core::{Chunk, PlayerSettings};
use serde::Serialize;

use crate::buffer::{BufferedRange, MediaBuffer, UpdateEnd};
use crate::error::{AppendError, PlaybackError, PlayerError};
use crate::history::HistoryLog;
use crate::output::{PlayOrigin, PlaybackOutput};
use crate::timer::StartTimer;

/// Distance from the buffered end that counts as "at the end".
const EDGE_TOLERANCE_SECS: f64 = 0.05;

// ── State ────────────────────────────────────────────────────────────────────

/// Why a player closed.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// Explicit stop or player close.
    Stopped,
    /// Playback reached the end of a completed stream.
    Ended,
    /// An unrecoverable error.
    Fatal(PlayerError),
    /// The delivery channel ended before `complete`.
    TransportLost,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BufferState {
    Empty,
    Buffering,
    Playing,
    Starved,
    AwaitingGesture,
    Closed(CloseReason),
}

impl BufferState {
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Starved => "starved",
            Self::AwaitingGesture => "awaiting_gesture",
            Self::Closed(_) => "closed",
        }
    }
}

/// What moved `Buffering` to playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTrigger {
    Threshold,
    Timeout,
    StreamComplete,
    UserPlay,
}

// ── Manager ──────────────────────────────────────────────────────────────────

/// Owns the media buffer, the output, the pending queue and the start timer.
#[derive(Debug)]
pub struct BufferManager<B, O> {
    settings: PlayerSettings,
    buffer: B,
    output: O,
    state: BufferState,
    pending: VecDeque<Chunk>,
    in_flight: Option<Chunk>,
    buffered_bytes: u64,
    history: HistoryLog,
    timer: StartTimer,
    start_trigger: Option<StartTrigger>,
    overdue_start: Option<StartTrigger>,
    stream_complete: bool,
    user_paused: bool,
    evictions: usize,
}

impl<B: MediaBuffer, O: PlaybackOutput> BufferManager<B, O> {
    /// Open `buffer` for the configured MIME type and take ownership of both
    /// resources.
    ///
    /// An unsupported type is fatal: the buffer is released and the error
    /// returned.
    pub fn open(mut buffer: B, mut output: O, settings: PlayerSettings) -> Result<Self, PlayerError> {
        if let Err(err) = buffer.open(&settings.mime_type) {
            tracing::error!(mime = %settings.mime_type, error = %err, "Cannot open media buffer");
            buffer.release();
            return Err(err);
        }
        output.set_rate(settings.playback_rate);

        Ok(Self {
            history: HistoryLog::new(settings.byte_rate),
            settings,
            buffer,
            output,
            state: BufferState::Empty,
            pending: VecDeque::new(),
            in_flight: None,
            buffered_bytes: 0,
            timer: StartTimer::new(),
            start_trigger: None,
            overdue_start: None,
            stream_complete: false,
            user_paused: false,
            evictions: 0,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub const fn state(&self) -> &BufferState {
        &self.state
    }

    #[must_use]
    pub const fn buffered_bytes(&self) -> u64 {
        self.buffered_bytes
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub const fn append_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub const fn has_started_playback(&self) -> bool {
        self.start_trigger.is_some()
    }

    #[must_use]
    pub const fn start_trigger(&self) -> Option<StartTrigger> {
        self.start_trigger
    }

    /// Number of capacity evictions performed.
    #[must_use]
    pub const fn evictions(&self) -> usize {
        self.evictions
    }

    #[must_use]
    pub const fn is_stream_complete(&self) -> bool {
        self.stream_complete
    }

    #[must_use]
    pub const fn is_user_paused(&self) -> bool {
        self.user_paused
    }

    #[must_use]
    pub const fn history(&self) -> &HistoryLog {
        &self.history
    }

    #[must_use]
    pub const fn start_timer(&self) -> &StartTimer {
        &self.timer
    }

    #[must_use]
    pub const fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    #[must_use]
    pub fn buffered(&self) -> Option<BufferedRange> {
        self.buffer.buffered()
    }

    #[must_use]
    pub const fn buffer(&self) -> &B {
        &self.buffer
    }

    #[must_use]
    pub const fn output(&self) -> &O {
        &self.output
    }

    pub const fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Take the history, leaving an empty log behind.
    pub fn take_history(&mut self) -> HistoryLog {
        std::mem::replace(&mut self.history, HistoryLog::new(self.settings.byte_rate))
    }

    // ── Inputs ───────────────────────────────────────────────────────────────

    /// Queue a chunk received from the delivery channel.
    pub fn receive_chunk(&mut self, chunk: Chunk) {
        if self.state.is_closed() {
            tracing::debug!(turn = chunk.turn_index, seq = chunk.seq, "Dropping chunk after close");
            return;
        }
        if self.state == BufferState::Empty {
            self.timer.arm(self.settings.start_timeout());
            self.set_state(BufferState::Buffering);
        }
        self.pending.push_back(chunk);
        self.pump();
    }

    /// The in-flight append finished.
    pub fn on_update_end(&mut self, update: UpdateEnd) {
        if self.state.is_closed() {
            return;
        }
        self.buffer.finish_update();
        let Some(chunk) = self.in_flight.take() else {
            tracing::debug!(bytes = update.bytes, "Update end with no append in flight");
            return;
        };

        self.buffered_bytes += chunk.len() as u64;
        self.history.record(&chunk);
        tracing::debug!(
            turn = chunk.turn_index,
            seq = chunk.seq,
            buffered_bytes = self.buffered_bytes,
            "Chunk buffered"
        );

        match self.state {
            BufferState::Buffering => {
                if self.buffered_bytes >= self.settings.start_threshold as u64 {
                    self.start_playback(StartTrigger::Threshold, PlayOrigin::Auto);
                } else if let Some(trigger) = self.overdue_start {
                    self.start_playback(trigger, PlayOrigin::Auto);
                }
            }
            BufferState::Starved if !self.user_paused => self.resume(PlayOrigin::Auto),
            _ => {}
        }

        self.pump();
    }

    /// The start timer's deadline passed.
    pub fn on_start_timeout(&mut self) {
        if !self.timer.disarm() || self.state != BufferState::Buffering {
            return;
        }
        if self.buffered_bytes > 0 {
            self.start_playback(StartTrigger::Timeout, PlayOrigin::Auto);
        } else {
            // Start as soon as the first append lands.
            tracing::debug!("Start timeout with nothing buffered yet");
            self.overdue_start = Some(StartTrigger::Timeout);
        }
    }

    /// Periodic playback check for starvation and end of stream.
    pub fn on_tick(&mut self) {
        if self.user_paused {
            return;
        }
        match self.state {
            BufferState::Playing => {
                let end = self.buffered_end();
                if self.output.position() + EDGE_TOLERANCE_SECS < end {
                    return;
                }
                if self.drained() {
                    self.close(CloseReason::Ended);
                } else {
                    tracing::warn!(position = end, "Playback starved");
                    self.output.pause();
                    self.output.seek(end);
                    self.set_state(BufferState::Starved);
                }
            }
            BufferState::Starved => {
                if self.output.position() + EDGE_TOLERANCE_SECS < self.buffered_end() {
                    self.resume(PlayOrigin::Auto);
                } else if self.drained() {
                    self.close(CloseReason::Ended);
                }
            }
            _ => {}
        }
    }

    /// The server sent `complete`: no more chunks will arrive.
    pub fn on_stream_complete(&mut self) {
        self.stream_complete = true;
        match self.state {
            BufferState::Empty => self.close(CloseReason::Ended),
            BufferState::Buffering => {
                if self.buffered_bytes > 0 {
                    self.start_playback(StartTrigger::StreamComplete, PlayOrigin::Auto);
                } else {
                    self.overdue_start = Some(StartTrigger::StreamComplete);
                }
            }
            _ => {}
        }
    }

    /// The delivery channel ended or broke before `complete`.
    pub fn on_transport_lost(&mut self) {
        self.close(CloseReason::TransportLost);
    }

    /// Close with an unrecoverable error.
    pub fn fail(&mut self, err: PlayerError) {
        self.close(CloseReason::Fatal(err));
    }

    // ── User commands ────────────────────────────────────────────────────────

    pub fn play(&mut self) {
        match self.state {
            BufferState::AwaitingGesture => {
                self.user_paused = false;
                self.resume(PlayOrigin::User);
            }
            BufferState::Playing | BufferState::Starved if self.user_paused => {
                self.user_paused = false;
                self.resume(PlayOrigin::User);
            }
            BufferState::Buffering if self.buffered_bytes > 0 => {
                self.start_playback(StartTrigger::UserPlay, PlayOrigin::User);
            }
            _ => {}
        }
    }

    pub fn pause(&mut self) {
        if matches!(self.state, BufferState::Playing | BufferState::Starved) {
            self.output.pause();
            self.user_paused = true;
        }
    }

    /// Change playback speed, clamped to the supported range. Returns the
    /// applied rate.
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        let rate = if rate.is_finite() {
            rate.clamp(PlayerSettings::MIN_RATE, PlayerSettings::MAX_RATE)
        } else {
            1.0
        };
        self.output.set_rate(rate);
        rate
    }

    pub fn stop(&mut self) {
        self.close(CloseReason::Stopped);
    }

    /// Bring evicted audio back from the history log so that `secs` is
    /// buffered again, as far as free capacity allows. Returns the buffered
    /// range afterwards.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn restore_history(&mut self, secs: f64) -> Option<BufferedRange> {
        let range = self.buffer.buffered();
        let Some(current) = range else {
            return range;
        };
        if self.state.is_closed() || !secs.is_finite() || secs >= current.start {
            return range;
        }

        let front = self.history.total_bytes().saturating_sub(self.buffered_bytes);
        let wanted = (secs.max(0.0) * f64::from(self.settings.byte_rate.max(1))).floor() as u64;
        let in_flight = self.in_flight.as_ref().map_or(0, |chunk| chunk.len() as u64);
        let free = (self.settings.buffer_capacity as u64)
            .saturating_sub(self.buffered_bytes + in_flight);
        let from = wanted.max(front.saturating_sub(free));
        if from >= front {
            tracing::debug!(secs, free, "No room to restore history");
            return range;
        }

        let data = self.history.bytes_between(from, front);
        let restored = data.len();
        match self.buffer.restore_front(data.into()) {
            Ok(()) => {
                self.buffered_bytes += restored as u64;
                tracing::debug!(secs, restored, "Restored evicted audio from history");
            }
            Err(err) => tracing::warn!(secs, error = %err, "Cannot restore evicted audio"),
        }
        self.buffer.buffered()
    }

    /// Stop once every delivered chunk is buffered, without waiting for
    /// playback to reach the end.
    pub fn finish_if_drained(&mut self) -> bool {
        if !self.state.is_closed() && self.drained() {
            self.close(CloseReason::Ended);
            return true;
        }
        false
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn set_state(&mut self, next: BufferState) {
        if self.state != next {
            tracing::debug!(from = self.state.name(), to = next.name(), "Buffer state changed");
            self.state = next;
        }
    }

    fn buffered_end(&self) -> f64 {
        self.buffer.buffered().map_or(0.0, |range| range.end)
    }

    fn drained(&self) -> bool {
        self.stream_complete && self.pending.is_empty() && self.in_flight.is_none()
    }

    fn start_playback(&mut self, trigger: StartTrigger, origin: PlayOrigin) {
        self.timer.disarm();
        self.overdue_start = None;
        if self.start_trigger.is_some() {
            return;
        }
        self.start_trigger = Some(trigger);
        tracing::info!(
            trigger = ?trigger,
            buffered_bytes = self.buffered_bytes,
            "Starting playback"
        );
        self.resume(origin);
    }

    fn resume(&mut self, origin: PlayOrigin) {
        match self.output.play(origin) {
            Ok(()) => self.set_state(BufferState::Playing),
            Err(PlaybackError::Blocked) => {
                tracing::warn!("Playback blocked, waiting for user gesture");
                self.set_state(BufferState::AwaitingGesture);
            }
            Err(err) => self.fail(err.into()),
        }
    }

    /// Start the next append if none is in flight.
    fn pump(&mut self) {
        if self.in_flight.is_some() || self.state.is_closed() {
            return;
        }
        let Some(chunk) = self.pending.pop_front() else {
            return;
        };
        match self.append_with_eviction(&chunk) {
            Ok(()) => self.in_flight = Some(chunk),
            Err(err) => self.fail(err),
        }
    }

    /// Append, and on a capacity error evict the oldest window and retry
    /// exactly once.
    fn append_with_eviction(&mut self, chunk: &Chunk) -> Result<(), PlayerError> {
        match self.buffer.append(chunk.bytes.clone()) {
            Ok(()) => Ok(()),
            Err(AppendError::QuotaExceeded { requested, free }) => {
                let removed = self.buffer.evict_front(self.settings.eviction_window_secs);
                self.evictions += 1;
                self.buffered_bytes = self.buffered_bytes.saturating_sub(removed as u64);
                tracing::warn!(
                    requested,
                    free,
                    removed,
                    "Media buffer full, evicted oldest audio"
                );
                self.buffer
                    .append(chunk.bytes.clone())
                    .map_err(PlayerError::BufferOverflow)
            }
            Err(err) => Err(PlayerError::Append(err)),
        }
    }

    fn close(&mut self, reason: CloseReason) {
        if self.state.is_closed() {
            return;
        }
        self.timer.disarm();
        self.overdue_start = None;
        self.pending.clear();
        self.in_flight = None;
        self.output.stop();
        self.buffer.release();

        match &reason {
            CloseReason::Fatal(err) => tracing::error!(error = %err, "Player closed"),
            CloseReason::TransportLost => tracing::warn!("Player closed: transport lost"),
            CloseReason::Stopped | CloseReason::Ended => {
                tracing::info!(reason = ?reason, "Player closed");
            }
        }
        self.set_state(BufferState::Closed(reason));
    }
}
