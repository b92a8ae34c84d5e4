//! Offline synthesis backend: one sine tone per turn, encoded as WAV.
//!
//! Pitch is chosen by voice and length grows with the text, so two hosts are
//! audibly distinct and the output is byte-for-byte deterministic.

use std::f32::consts::TAU;
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pulsecast_core::{SpeechSynthesizer, SynthesisError};

/// Output sample rate.
pub const SAMPLE_RATE: u32 = 16_000;

/// Encoded bytes per second of output (16-bit mono).
pub const BYTE_RATE: u32 = SAMPLE_RATE * 2;

const MS_PER_CHAR: u64 = 60;
const MIN_MS: u64 = 250;
const MAX_MS: u64 = 20_000;

/// Deterministic tone generator standing in for a real speech service.
#[derive(Debug, Clone, Default)]
pub struct ToneSynthesizer {
    latency: Duration,
}

impl ToneSynthesizer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`, imitating a remote service.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Tone frequency for `voice`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frequency(voice: &str) -> f32 {
        match voice {
            "nova" => 440.0,
            "onyx" => 196.0,
            "alloy" => 330.0,
            "echo" => 262.0,
            "fable" => 392.0,
            "shimmer" => 523.0,
            other => {
                let sum: u32 = other.bytes().map(u32::from).sum();
                200.0 + (sum % 400) as f32
            }
        }
    }

    /// Tone length for `text`.
    #[must_use]
    pub fn duration_for(text: &str) -> Duration {
        let chars = text.chars().count() as u64;
        Duration::from_millis((chars * MS_PER_CHAR).clamp(MIN_MS, MAX_MS))
    }

    fn render(text: &str, voice: &str) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let frequency = Self::frequency(voice);
        let duration = Self::duration_for(text);
        let millis = u64::try_from(duration.as_millis()).unwrap_or(MAX_MS);
        let samples = u64::from(SAMPLE_RATE) * millis / 1000;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            let amplitude = f32::from(i16::MAX) * 0.3;
            for n in 0..samples {
                #[allow(clippy::cast_precision_loss)]
                let t = n as f32 / SAMPLE_RATE as f32;
                #[allow(clippy::cast_possible_truncation)]
                let sample = ((TAU * frequency * t).sin() * amplitude) as i16;
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, SynthesisError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let wav =
            Self::render(text, voice).map_err(|e| SynthesisError::Encoding(e.to_string()))?;
        tracing::debug!(voice, chars = text.len(), bytes = wav.len(), "Rendered tone");
        Ok(Bytes::from(wav))
    }

    fn mime_type(&self) -> &'static str {
        "audio/wav"
    }

    fn name(&self) -> &'static str {
        "tone"
    }
}
