//! Speech synthesis backends implementing [`SpeechSynthesizer`].
//!
//! | Backend | Module | Output |
//! |---------|--------|--------|
//! | OpenAI `/v1/audio/speech` | [`openai`] | `audio/mpeg` |
//! | Offline tone generator | [`tone`] | `audio/wav` |
//!
//! [`SpeechSynthesizer`]: pulsecast_core::SpeechSynthesizer

pub mod openai;
pub mod tone;

pub use openai::{OpenAiConfig, OpenAiSpeech};
pub use tone::ToneSynthesizer;
