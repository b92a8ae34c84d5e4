//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the orchestrator expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client or server types in any signature
//! - Synthesis failures are per-turn and recoverable
//! - Transport failures are per-session and fatal

pub mod delivery;
pub mod synthesis;

pub use delivery::{EventSink, NoopSink, TransportError};
pub use synthesis::{SpeechSynthesizer, SynthesisError};
