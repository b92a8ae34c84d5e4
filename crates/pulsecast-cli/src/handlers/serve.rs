//! Serve command handler.
//!
//! Builds the synthesis backend and runs the HTTP adapter until Ctrl+C.

use std::sync::Arc;

use pulsecast_axum::{ServerConfig, start_server};
use pulsecast_core::{SpeechSynthesizer, StreamSettings};
use pulsecast_stream::{OpenAiConfig, OpenAiSpeech, ToneSynthesizer};
use tokio_util::sync::CancellationToken;

use crate::commands::{Backend, ServeArgs};
use crate::error::CliError;

/// Execute the serve command.
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let synthesizer = build_synthesizer(&args)?;
    let config = server_config(&args, StreamSettings::from_env()?)?;

    println!();
    println!("  pulsecast server starting ({} backend)...", synthesizer.name());
    println!();
    println!("  Stream:  http://localhost:{}/api/podcast/stream", config.port);
    println!("  Health:  http://localhost:{}/health", config.port);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        trigger.cancel();
    });

    start_server(config, synthesizer, shutdown).await
}

fn build_synthesizer(args: &ServeArgs) -> Result<Arc<dyn SpeechSynthesizer>, CliError> {
    match args.backend {
        Backend::Tone => Ok(Arc::new(ToneSynthesizer::new())),
        Backend::Openai => {
            let api_key = args
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    CliError::Config(
                        "OPENAI_API_KEY is not set. Pass --api-key or use --backend tone"
                            .to_string(),
                    )
                })?;
            let mut config = OpenAiConfig::new(api_key);
            if let Some(base_url) = &args.base_url {
                config = config.with_base_url(base_url.as_str());
            }
            if let Some(model) = &args.model {
                config = config.with_model(model.as_str());
            }
            Ok(Arc::new(OpenAiSpeech::new(config)))
        }
    }
}

/// Apply command-line flags on top of `stream` and validate the result.
fn server_config(args: &ServeArgs, mut stream: StreamSettings) -> Result<ServerConfig, CliError> {
    if let Some(chunk_size) = args.chunk_size {
        stream.chunk_size = chunk_size;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        stream.pacing_ms = pacing_ms;
    }
    if let Some(voice) = &args.host1_voice {
        stream.voices.host1.clone_from(voice);
    }
    if let Some(voice) = &args.host2_voice {
        stream.voices.host2.clone_from(voice);
    }
    stream.validate()?;

    let mut config = ServerConfig::default()
        .with_port(args.port)
        .with_stream_settings(stream);
    config.host.clone_from(&args.host);
    if !args.allow_origins.is_empty() {
        config = config.with_allowed_origins(args.allow_origins.clone());
    }
    Ok(config)
}
