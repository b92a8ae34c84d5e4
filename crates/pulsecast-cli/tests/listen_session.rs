//! `listen` against a live server on a loopback port.

use std::sync::Arc;

use clap::Parser;
use pulsecast_axum::{CorsConfig, ServerConfig, bootstrap, create_router};
use pulsecast_cli::{Cli, CliError, Commands, ListenArgs, handlers};
use pulsecast_core::{SpeechSynthesizer, StreamSettings};
use pulsecast_stream::ToneSynthesizer;
use tokio_util::sync::CancellationToken;

/// Serve the tone backend on `127.0.0.1:0` and return its base URL.
async fn spawn_server(shutdown: CancellationToken) -> String {
    let config = ServerConfig::default().with_stream_settings(StreamSettings {
        pacing_ms: 0,
        ..StreamSettings::default()
    });
    let ctx = bootstrap(&config, Arc::new(ToneSynthesizer::new()), shutdown.clone()).unwrap();
    let app = create_router(ctx, &CorsConfig::AllowAll);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

fn listen_args(argv: &[&str]) -> ListenArgs {
    let argv = ["pulsecast", "listen"].iter().chain(argv).copied();
    match Cli::parse_from(argv).command {
        Commands::Listen(args) => args,
        Commands::Serve(_) => unreachable!(),
    }
}

#[tokio::test]
async fn listen_records_every_turn() {
    let shutdown = CancellationToken::new();
    let server = spawn_server(shutdown.clone()).await;
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().to_str().unwrap();

    let args = listen_args(&[
        "--server",
        &server,
        "--line",
        "hi mark",
        "--line",
        "hi rahil",
        "--line",
        "bye",
        "--format",
        "wav",
        "--out",
        out_dir,
    ]);
    handlers::listen::execute(args).await.unwrap();

    let tone = ToneSynthesizer::new();
    for (turn, (text, voice)) in [("hi mark", "nova"), ("hi rahil", "onyx"), ("bye", "nova")]
        .into_iter()
        .enumerate()
    {
        let written = std::fs::read(out.path().join(format!("turn-{turn:03}.wav"))).unwrap();
        let expected = tone.synthesize(text, voice).await.unwrap();
        assert_eq!(written, expected.to_vec(), "turn {turn}");
    }
    assert!(!out.path().join("episode.wav").exists());

    shutdown.cancel();
}

#[tokio::test]
async fn listen_surfaces_server_rejection() {
    let shutdown = CancellationToken::new();
    let server = spawn_server(shutdown.clone()).await;

    let args = listen_args(&["--server", &server, "--line", "   "]);
    let err = handlers::listen::execute(args).await.unwrap_err();

    let cli_err = err.downcast_ref::<CliError>().unwrap();
    assert!(matches!(cli_err, CliError::Server(msg) if msg.contains("400")));
    assert_eq!(cli_err.exit_code(), 69);

    shutdown.cancel();
}

#[tokio::test]
async fn listen_without_script_is_a_usage_error() {
    let args = listen_args(&[]);
    let err = handlers::listen::execute(args).await.unwrap_err();
    let cli_err = err.downcast_ref::<CliError>().unwrap();
    assert_eq!(cli_err.exit_code(), 64);
}
