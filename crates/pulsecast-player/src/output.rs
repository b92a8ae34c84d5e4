//! Audible output abstraction.

use tokio::time::Instant;

use crate::error::PlaybackError;

/// Who asked for playback to start.
///
/// Outputs with an autoplay policy refuse [`PlayOrigin::Auto`] until a
/// [`PlayOrigin::User`] request has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOrigin {
    Auto,
    User,
}

/// The device that turns buffered audio into sound.
pub trait PlaybackOutput: Send {
    fn play(&mut self, origin: PlayOrigin) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    /// Current playhead in seconds.
    fn position(&self) -> f64;

    /// Move the playhead. Negative positions clamp to zero.
    fn seek(&mut self, position: f64);

    fn set_rate(&mut self, rate: f64);

    fn rate(&self) -> f64;

    /// Stop for good and rewind.
    fn stop(&mut self);
}

/// Playhead driven by the tokio clock.
///
/// Advances at `rate` seconds per second while playing. It has no notion of
/// buffered data; the buffer manager pauses it at the buffered end.
#[derive(Debug, Clone)]
pub struct ClockOutput {
    base: f64,
    started: Option<Instant>,
    rate: f64,
    requires_gesture: bool,
    gesture_seen: bool,
    stopped: bool,
}

impl Default for ClockOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockOutput {
    /// An output that may start on its own.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base: 0.0,
            started: None,
            rate: 1.0,
            requires_gesture: false,
            gesture_seen: false,
            stopped: false,
        }
    }

    /// An output that blocks automatic playback until a user gesture.
    #[must_use]
    pub const fn requiring_gesture() -> Self {
        Self {
            requires_gesture: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn rebase(&mut self) {
        self.base = self.position();
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }
}

impl PlaybackOutput for ClockOutput {
    fn play(&mut self, origin: PlayOrigin) -> Result<(), PlaybackError> {
        if origin == PlayOrigin::User {
            self.gesture_seen = true;
        } else if self.requires_gesture && !self.gesture_seen {
            return Err(PlaybackError::Blocked);
        }
        if !self.stopped && self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.base = self.position();
        self.started = None;
    }

    fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn position(&self) -> f64 {
        self.started.map_or(self.base, |started| {
            self.base + started.elapsed().as_secs_f64() * self.rate
        })
    }

    fn seek(&mut self, position: f64) {
        self.base = position.max(0.0);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn set_rate(&mut self, rate: f64) {
        self.rebase();
        self.rate = rate;
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn stop(&mut self) {
        self.started = None;
        self.base = 0.0;
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn position_follows_clock_and_rate() {
        let mut output = ClockOutput::new();
        output.play(PlayOrigin::Auto).unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!((output.position() - 2.0).abs() < 1e-6);

        output.set_rate(2.0);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((output.position() - 4.0).abs() < 1e-6);

        output.pause();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((output.position() - 4.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_moves_playhead() {
        let mut output = ClockOutput::new();
        output.seek(-3.0);
        assert!(output.position().abs() < f64::EPSILON);
        output.seek(10.0);
        output.play(PlayOrigin::Auto).unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!((output.position() - 10.5).abs() < 1e-6);
    }

    #[test]
    fn autoplay_policy() {
        let mut output = ClockOutput::requiring_gesture();
        assert_eq!(output.play(PlayOrigin::Auto), Err(PlaybackError::Blocked));
        assert!(!output.is_playing());
        output.play(PlayOrigin::User).unwrap();
        output.pause();
        output.play(PlayOrigin::Auto).unwrap();
        assert!(output.is_playing());
    }

    #[test]
    fn stopped_output_stays_silent() {
        let mut output = ClockOutput::new();
        output.stop();
        output.play(PlayOrigin::User).unwrap();
        assert!(!output.is_playing());
        assert!(output.is_stopped());
    }
}
