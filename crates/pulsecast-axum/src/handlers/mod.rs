//! HTTP request handlers for the Axum web server.
//!
//! Handlers are thin: they validate input, start a session on the shared
//! orchestrator and hand its events to a transport.

pub mod health;
pub mod stream;
pub mod ws;
