//! Settings for the stream side and the player side, with validation.
//!
//! Both structs deserialize with per-field defaults so partial config files
//! work, and both can be overridden from `PULSECAST_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_TURNS, VoiceAssignment};

/// Default delay between two audio chunk emissions.
pub const DEFAULT_PACING_MS: u64 = 50;

/// Default bound on in-flight events between orchestrator and transport.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default per-turn synthesis timeout.
pub const DEFAULT_SYNTHESIS_TIMEOUT_MS: u64 = 60_000;

/// Default buffered byte count that starts playback.
pub const DEFAULT_START_THRESHOLD: usize = 2000;

/// Default time after which playback starts with whatever is buffered.
pub const DEFAULT_START_TIMEOUT_MS: u64 = 5000;

/// Default distance from the live edge that still counts as live.
pub const DEFAULT_LIVE_EDGE_EPSILON_SECS: f64 = 0.5;

/// 128 kbit/s, the bitrate of the default mp3 output.
pub const DEFAULT_BYTE_RATE: u32 = 16_000;

// ── Stream settings ──────────────────────────────────────────────────────────

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Raw bytes per `audio` event.
    pub chunk_size: usize,
    /// Delay between consecutive `audio` events.
    pub pacing_ms: u64,
    /// Capacity of the in-process delivery channel.
    pub channel_capacity: usize,
    /// Upper bound on a single synthesis call.
    pub synthesis_timeout_ms: u64,
    /// Largest script accepted.
    pub max_turns: usize,
    /// Voice per host.
    pub voices: VoiceAssignment,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pacing_ms: DEFAULT_PACING_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            synthesis_timeout_ms: DEFAULT_SYNTHESIS_TIMEOUT_MS,
            max_turns: DEFAULT_MAX_TURNS,
            voices: VoiceAssignment::default(),
        }
    }
}

impl StreamSettings {
    #[must_use]
    pub const fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    #[must_use]
    pub const fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply `PULSECAST_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "PULSECAST_CHUNK_SIZE", &mut self.chunk_size)?;
        override_parsed(&lookup, "PULSECAST_PACING_MS", &mut self.pacing_ms)?;
        override_parsed(
            &lookup,
            "PULSECAST_CHANNEL_CAPACITY",
            &mut self.channel_capacity,
        )?;
        override_parsed(
            &lookup,
            "PULSECAST_SYNTHESIS_TIMEOUT_MS",
            &mut self.synthesis_timeout_ms,
        )?;
        override_parsed(&lookup, "PULSECAST_MAX_TURNS", &mut self.max_turns)?;
        override_parsed(&lookup, "PULSECAST_HOST1_VOICE", &mut self.voices.host1)?;
        override_parsed(&lookup, "PULSECAST_HOST2_VOICE", &mut self.voices.host2)?;
        self.validate()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size == 0 {
            return Err(SettingsError::InvalidChunkSize(self.chunk_size));
        }
        if self.channel_capacity == 0 {
            return Err(SettingsError::InvalidChannelCapacity(self.channel_capacity));
        }
        if self.synthesis_timeout_ms == 0 {
            return Err(SettingsError::ZeroDuration("synthesis_timeout_ms"));
        }
        if self.max_turns == 0 {
            return Err(SettingsError::InvalidMaxTurns(self.max_turns));
        }
        if self.voices.host1.trim().is_empty() || self.voices.host2.trim().is_empty() {
            return Err(SettingsError::BlankVoice);
        }
        Ok(())
    }
}

// ── Player settings ──────────────────────────────────────────────────────────

/// Buffer manager and timeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Buffered bytes that start playback.
    pub start_threshold: usize,
    /// Forced start once buffering has lasted this long.
    pub start_timeout_ms: u64,
    /// Release within this distance of the live edge returns to live.
    pub live_edge_epsilon_secs: f64,
    /// Amount of oldest audio evicted on a capacity error.
    pub eviction_window_secs: f64,
    /// Capacity of the in-memory media buffer.
    pub buffer_capacity: usize,
    /// Bytes per second of the encoded stream.
    pub byte_rate: u32,
    /// Playback tick used for starvation and end detection.
    pub tick_ms: u64,
    /// MIME type the media buffer is opened with.
    pub mime_type: String,
    /// Initial playback speed.
    pub playback_rate: f64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            start_threshold: DEFAULT_START_THRESHOLD,
            start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
            live_edge_epsilon_secs: DEFAULT_LIVE_EDGE_EPSILON_SECS,
            eviction_window_secs: 1.0,
            buffer_capacity: 8 * 1024 * 1024,
            byte_rate: DEFAULT_BYTE_RATE,
            tick_ms: 250,
            mime_type: "audio/mpeg".to_string(),
            playback_rate: 1.0,
        }
    }
}

impl PlayerSettings {
    /// Slowest accepted playback rate.
    pub const MIN_RATE: f64 = 0.5;
    /// Fastest accepted playback rate.
    pub const MAX_RATE: f64 = 2.0;

    #[must_use]
    pub const fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply `PULSECAST_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(
            &lookup,
            "PULSECAST_START_THRESHOLD",
            &mut self.start_threshold,
        )?;
        override_parsed(
            &lookup,
            "PULSECAST_START_TIMEOUT_MS",
            &mut self.start_timeout_ms,
        )?;
        override_parsed(
            &lookup,
            "PULSECAST_LIVE_EPSILON_SECS",
            &mut self.live_edge_epsilon_secs,
        )?;
        override_parsed(
            &lookup,
            "PULSECAST_EVICTION_SECS",
            &mut self.eviction_window_secs,
        )?;
        override_parsed(
            &lookup,
            "PULSECAST_BUFFER_CAPACITY",
            &mut self.buffer_capacity,
        )?;
        override_parsed(&lookup, "PULSECAST_BYTE_RATE", &mut self.byte_rate)?;
        override_parsed(&lookup, "PULSECAST_TICK_MS", &mut self.tick_ms)?;
        override_parsed(&lookup, "PULSECAST_MIME_TYPE", &mut self.mime_type)?;
        self.validate()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.start_timeout_ms == 0 {
            return Err(SettingsError::ZeroDuration("start_timeout_ms"));
        }
        if self.tick_ms == 0 {
            return Err(SettingsError::ZeroDuration("tick_ms"));
        }
        if !(self.live_edge_epsilon_secs.is_finite() && self.live_edge_epsilon_secs >= 0.0) {
            return Err(SettingsError::InvalidSeconds {
                field: "live_edge_epsilon_secs",
                value: self.live_edge_epsilon_secs,
            });
        }
        if !(self.eviction_window_secs.is_finite() && self.eviction_window_secs > 0.0) {
            return Err(SettingsError::InvalidSeconds {
                field: "eviction_window_secs",
                value: self.eviction_window_secs,
            });
        }
        if self.byte_rate == 0 {
            return Err(SettingsError::InvalidByteRate(self.byte_rate));
        }
        if self.buffer_capacity < self.start_threshold {
            return Err(SettingsError::CapacityBelowThreshold {
                capacity: self.buffer_capacity,
                threshold: self.start_threshold,
            });
        }
        if !(Self::MIN_RATE..=Self::MAX_RATE).contains(&self.playback_rate) {
            return Err(SettingsError::InvalidRate(self.playback_rate));
        }
        if self.mime_type.trim().is_empty() {
            return Err(SettingsError::EmptyMimeType);
        }
        Ok(())
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Chunk size must be at least 1 byte, got {0}")]
    InvalidChunkSize(usize),

    #[error("Channel capacity must be at least 1, got {0}")]
    InvalidChannelCapacity(usize),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Max turns must be at least 1, got {0}")]
    InvalidMaxTurns(usize),

    #[error("Host voices cannot be empty")]
    BlankVoice,

    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },

    #[error("Byte rate must be greater than zero, got {0}")]
    InvalidByteRate(u32),

    #[error("Buffer capacity {capacity} is below the start threshold {threshold}")]
    CapacityBelowThreshold { capacity: usize, threshold: usize },

    #[error("Playback rate must be between 0.5 and 2.0, got {0}")]
    InvalidRate(f64),

    #[error("MIME type cannot be empty")]
    EmptyMimeType,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

fn override_parsed<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidEnv { key, value: raw })?;
        tracing::debug!(key, "Applied environment override");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_stream_settings() {
        let settings = StreamSettings::default();
        assert_eq!(settings.chunk_size, 4096);
        assert_eq!(settings.pacing(), Duration::from_millis(50));
        assert_eq!(settings.voices.host1, "nova");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_player_settings() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.start_threshold, 2000);
        assert_eq!(settings.start_timeout(), Duration::from_millis(5000));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_stream_env_overrides() {
        let mut settings = StreamSettings::default();
        settings
            .apply_overrides(env(&[
                ("PULSECAST_CHUNK_SIZE", "1024"),
                ("PULSECAST_PACING_MS", " 10 "),
                ("PULSECAST_HOST2_VOICE", "echo"),
            ]))
            .unwrap();
        assert_eq!(settings.chunk_size, 1024);
        assert_eq!(settings.pacing_ms, 10);
        assert_eq!(settings.voices.host2, "echo");
    }

    #[test]
    fn test_unparseable_env_value() {
        let mut settings = PlayerSettings::default();
        let err = settings
            .apply_overrides(env(&[("PULSECAST_START_THRESHOLD", "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            SettingsError::InvalidEnv {
                key: "PULSECAST_START_THRESHOLD",
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn test_override_result_is_validated() {
        let mut settings = StreamSettings::default();
        assert_eq!(
            settings.apply_overrides(env(&[("PULSECAST_CHUNK_SIZE", "0")])),
            Err(SettingsError::InvalidChunkSize(0))
        );
    }

    #[test]
    fn test_validate_rate_bounds() {
        let settings = PlayerSettings {
            playback_rate: 3.0,
            ..PlayerSettings::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::InvalidRate(3.0)));
    }

    #[test]
    fn test_validate_capacity_below_threshold() {
        let settings = PlayerSettings {
            buffer_capacity: 100,
            ..PlayerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::CapacityBelowThreshold { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: PlayerSettings = serde_json::from_str(r#"{"start_threshold": 4000}"#).unwrap();
        assert_eq!(settings.start_threshold, 4000);
        assert_eq!(settings.tick_ms, 250);
    }
}
