//! Domain types for scripted audio sessions.

mod chunk;
mod script;
mod session;
mod turn;

pub use chunk::{Chunk, DEFAULT_CHUNK_SIZE, split_audio};
pub use script::{
    DEFAULT_HOST1_VOICE, DEFAULT_HOST2_VOICE, DEFAULT_MAX_TURNS, Script, ScriptError,
    VoiceAssignment,
};
pub use session::{SessionState, StreamSession};
pub use turn::{Speaker, Turn, TurnStatus};
