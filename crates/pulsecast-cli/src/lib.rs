#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use axum as _;
#[cfg(test)]
use tempfile as _;

// Used by the binary only.
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::{Backend, Commands, ListenArgs, ServeArgs, WireFormat};
pub use error::CliError;
pub use parser::Cli;
