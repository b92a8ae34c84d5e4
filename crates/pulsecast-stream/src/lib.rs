#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod channel;
pub mod error;
pub mod orchestrator;

pub use backend::{OpenAiConfig, OpenAiSpeech, ToneSynthesizer};
pub use channel::{DeliveryReceiver, DeliverySender, delivery_channel};
pub use error::StreamError;
pub use orchestrator::{Orchestrator, SessionReport, StreamHandle};

#[cfg(test)]
use tokio_test as _;
