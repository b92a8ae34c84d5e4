#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    Chunk, DEFAULT_CHUNK_SIZE, DEFAULT_HOST1_VOICE, DEFAULT_HOST2_VOICE, DEFAULT_MAX_TURNS, Script,
    ScriptError, SessionState, Speaker, StreamSession, Turn, TurnStatus, VoiceAssignment,
    split_audio,
};
pub use events::StreamEvent;
pub use ports::{EventSink, NoopSink, SpeechSynthesizer, SynthesisError, TransportError};
pub use settings::{PlayerSettings, SettingsError, StreamSettings};

