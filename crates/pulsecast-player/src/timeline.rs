//! Live/seeking reconciliation.
//!
//! [`Timeline`] keeps two time bases apart: the live elapsed time since the
//! first audio arrived, which never stops while the stream is in progress,
//! and the listener's seek target inside already-buffered audio. All methods
//! take `now` explicitly so the session decides which clock drives them.

use serde::Serialize;
use tokio::time::Instant;

use crate::buffer::BufferedRange;
use crate::output::PlaybackOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineMode {
    Live,
    Seeking,
}

/// What a UI should render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineDisplay {
    pub position: f64,
    pub duration: f64,
    pub mode: TimelineMode,
}

/// Where a release gesture actually landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekResult {
    pub position: f64,
    pub mode: TimelineMode,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    origin: Option<Instant>,
    frozen: Option<f64>,
    mode: TimelineMode,
    seek_target: Option<f64>,
    scrub_position: Option<f64>,
    epsilon: f64,
}

impl Timeline {
    /// `epsilon` is how close to the live edge a release must land to count
    /// as returning to live.
    #[must_use]
    pub const fn new(epsilon: f64) -> Self {
        Self {
            origin: None,
            frozen: None,
            mode: TimelineMode::Live,
            seek_target: None,
            scrub_position: None,
            epsilon,
        }
    }

    /// Start the live clock. Later calls are ignored.
    pub fn start(&mut self, now: Instant) {
        if self.origin.is_none() {
            self.origin = Some(now);
        }
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.origin.is_some()
    }

    /// Stop the live clock at `secs`, once the stream is complete.
    pub fn freeze_at(&mut self, secs: f64) {
        let secs = secs.max(0.0);
        self.frozen = Some(secs);
        if let Some(target) = self.seek_target {
            self.seek_target = Some(target.min(secs));
        }
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    #[must_use]
    pub const fn mode(&self) -> TimelineMode {
        self.mode
    }

    #[must_use]
    pub const fn seek_target(&self) -> Option<f64> {
        self.seek_target
    }

    /// Seconds since the first audio arrived.
    #[must_use]
    pub fn live_elapsed(&self, now: Instant) -> f64 {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        self.origin
            .map_or(0.0, |origin| now.saturating_duration_since(origin).as_secs_f64())
    }

    /// The user grabbed the scrubber at `position`.
    pub fn scrub_start(&mut self, now: Instant, position: f64) {
        self.mode = TimelineMode::Seeking;
        self.scrub_position = Some(self.clamp_to_live(now, position));
    }

    /// The scrubber moved. Display follows, playback does not.
    pub fn scrub_move(&mut self, now: Instant, position: f64) {
        if self.mode == TimelineMode::Seeking {
            self.scrub_position = Some(self.clamp_to_live(now, position));
        }
    }

    /// The user let go at `position`.
    ///
    /// Landing within epsilon of live, past live, or past the buffered end
    /// returns to the live edge. Landing before the buffered start clamps up
    /// to it. Anywhere else the playhead moves exactly there and the mode
    /// stays seeking.
    pub fn release<O: PlaybackOutput + ?Sized>(
        &mut self,
        now: Instant,
        position: f64,
        buffered: Option<BufferedRange>,
        output: &mut O,
    ) -> SeekResult {
        self.scrub_position = None;
        let live = self.live_elapsed(now);
        let requested = if position.is_finite() { position.max(0.0) } else { 0.0 };

        let Some(range) = buffered else {
            return self.enter_live(None, live, output);
        };
        if requested >= live - self.epsilon || requested > range.end {
            return self.enter_live(Some(range), live, output);
        }

        let target = requested.max(range.start);
        if target >= live - self.epsilon {
            return self.enter_live(Some(range), live, output);
        }

        output.seek(target);
        self.mode = TimelineMode::Seeking;
        self.seek_target = Some(target);
        tracing::debug!(target, live, "Seek within history");
        SeekResult {
            position: target,
            mode: TimelineMode::Seeking,
        }
    }

    /// Jump back to the live edge.
    pub fn return_to_live<O: PlaybackOutput + ?Sized>(
        &mut self,
        now: Instant,
        buffered: Option<BufferedRange>,
        output: &mut O,
    ) -> SeekResult {
        self.scrub_position = None;
        let live = self.live_elapsed(now);
        self.enter_live(buffered, live, output)
    }

    /// Relative jump from the current playhead.
    pub fn skip<O: PlaybackOutput + ?Sized>(
        &mut self,
        now: Instant,
        delta: f64,
        buffered: Option<BufferedRange>,
        output: &mut O,
    ) -> SeekResult {
        let from = output.position();
        self.release(now, from + delta, buffered, output)
    }

    #[must_use]
    pub fn display(&self, now: Instant, output_position: f64) -> TimelineDisplay {
        let live = self.live_elapsed(now);
        match self.mode {
            TimelineMode::Live => TimelineDisplay {
                position: live,
                duration: live,
                mode: TimelineMode::Live,
            },
            TimelineMode::Seeking => TimelineDisplay {
                position: self.scrub_position.unwrap_or(output_position).min(live),
                duration: live,
                mode: TimelineMode::Seeking,
            },
        }
    }

    fn clamp_to_live(&self, now: Instant, position: f64) -> f64 {
        let live = self.live_elapsed(now);
        if position.is_finite() {
            position.clamp(0.0, live)
        } else {
            live
        }
    }

    fn enter_live<O: PlaybackOutput + ?Sized>(
        &mut self,
        buffered: Option<BufferedRange>,
        live: f64,
        output: &mut O,
    ) -> SeekResult {
        let edge = buffered.map_or(0.0, |range| range.clamp(live));
        if buffered.is_some() {
            output.seek(edge);
        }
        self.mode = TimelineMode::Live;
        self.seek_target = None;
        tracing::debug!(edge, live, "Returned to live");
        SeekResult {
            position: edge,
            mode: TimelineMode::Live,
        }
    }
}
