//! Command handlers.
//!
//! Each handler takes its parsed arguments, wires the library crates
//! together and reports the result on the terminal.

pub mod listen;
pub mod serve;
