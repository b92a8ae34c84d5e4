//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the synthesis backend, the
//! orchestrator and the router are wired together.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use pulsecast_core::{SpeechSynthesizer, StreamSettings};
use pulsecast_stream::Orchestrator;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 8787;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port for the HTTP server. `0` picks a free port.
    pub port: u16,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// Orchestrator settings applied to every session.
    pub stream: StreamSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors: CorsConfig::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    #[must_use]
    pub fn with_stream_settings(mut self, stream: StreamSettings) -> Self {
        self.stream = stream;
        self
    }
}

/// Services shared by every request.
#[derive(Debug)]
pub struct AxumContext {
    pub orchestrator: Orchestrator,
    /// Parent of every session's cancellation token.
    pub shutdown: CancellationToken,
}

/// Build the shared context.
pub fn bootstrap(
    config: &ServerConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    shutdown: CancellationToken,
) -> Result<AxumContext> {
    tracing::info!(
        backend = synthesizer.name(),
        mime = synthesizer.mime_type(),
        chunk_size = config.stream.chunk_size,
        pacing_ms = config.stream.pacing_ms,
        host1 = %config.stream.voices.host1,
        host2 = %config.stream.voices.host2,
        "Axum bootstrap"
    );
    let orchestrator = Orchestrator::new(synthesizer, config.stream.clone())?;
    Ok(AxumContext {
        orchestrator,
        shutdown,
    })
}

/// Bind, serve until `shutdown` fires, then let running sessions wind down.
pub async fn start_server(
    config: ServerConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    shutdown: CancellationToken,
) -> Result<()> {
    let ctx = bootstrap(&config, synthesizer, shutdown.clone())?;
    let app = crate::routes::create_router(ctx, &config.cors);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    tracing::info!("pulsecast server listening on http://{}", local);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("pulsecast server stopped");
    Ok(())
}
