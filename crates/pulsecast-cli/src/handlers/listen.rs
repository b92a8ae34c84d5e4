//! Listen command handler.
//!
//! Posts a script to a running server and feeds the SSE response through a
//! headless [`PlayerSession`]. With `--out`, the received audio is written
//! to disk once the stream has been buffered.

use std::path::{Path, PathBuf};

use futures_util::Stream;
use pulsecast_core::{PlayerSettings, StreamEvent};
use pulsecast_player::{
    HistoryLog, PlayerCommand, PlayerError, PlayerOutcome, PlayerSession, PlayerSnapshot,
    decode_sse,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::commands::{ListenArgs, WireFormat};
use crate::error::CliError;

/// Execute the listen command.
pub async fn execute(args: ListenArgs) -> anyhow::Result<()> {
    let lines = load_script(args.script.as_deref(), &args.lines)?;
    let settings = player_settings(&args, PlayerSettings::from_env()?)?;
    let turns = lines.len();

    let events = open_stream(&args, lines).await?;

    let mut session = PlayerSession::in_memory(settings)?.exit_when_drained(args.out.is_some());
    let watcher = spawn_state_logger(session.subscribe());

    let (commands_tx, commands_rx) = mpsc::channel(16);
    let stdin = args
        .interactive
        .then(|| spawn_stdin_commands(commands_tx.clone()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    println!("Streaming {turns} turns from {}", args.server);
    let outcome = session.run(events, commands_rx, cancel).await;

    watcher.abort();
    ctrl_c.abort();
    if let Some(stdin) = stdin {
        stdin.abort();
    }
    drop(commands_tx);

    report(&outcome);
    let outcome = outcome.into_result().map_err(CliError::from)?;

    if let Some(dir) = &args.out {
        let written = export_turns(&outcome.history, dir, args.format).await?;
        for path in written {
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// Turn texts from a JSON file or from repeated `--line` flags.
pub fn load_script(file: Option<&Path>, lines: &[String]) -> Result<Vec<String>, CliError> {
    let script = match file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|_| CliError::Arguments("Invalid script format".to_string()))?
        }
        None => lines.to_vec(),
    };
    if script.is_empty() {
        return Err(CliError::Arguments("No script provided".to_string()));
    }
    Ok(script)
}

/// Apply command-line flags on top of `settings` and validate the result.
pub fn player_settings(
    args: &ListenArgs,
    mut settings: PlayerSettings,
) -> Result<PlayerSettings, CliError> {
    settings.mime_type = args.format.mime_type().to_string();
    settings.byte_rate = args.format.byte_rate();
    if let Some(threshold) = args.start_threshold {
        settings.start_threshold = threshold;
    }
    if let Some(timeout) = args.start_timeout_ms {
        settings.start_timeout_ms = timeout;
    }
    if let Some(rate) = args.rate {
        settings.playback_rate = rate;
    }
    settings.validate()?;
    Ok(settings)
}

async fn open_stream(
    args: &ListenArgs,
    lines: Vec<String>,
) -> Result<impl Stream<Item = Result<StreamEvent, PlayerError>>, CliError> {
    let url = format!(
        "{}/api/podcast/stream",
        args.server.trim_end_matches('/')
    );
    let mut body = json!({ "script": lines });
    if args.host1_voice.is_some() || args.host2_voice.is_some() {
        body["voices"] = json!({ "host1": args.host1_voice, "host2": args.host2_voice });
    }

    debug!(%url, "Opening stream");
    let response = reqwest::Client::new().post(&url).json(&body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(CliError::Server(format!(
            "{status}: {}",
            server_error_message(&text)
        )));
    }

    Ok(decode_sse(Box::pin(response.bytes_stream())))
}

/// `error` from a JSON error body, or the raw body.
fn server_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn spawn_state_logger(mut snapshots: watch::Receiver<PlayerSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_state = "";
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot.state != last_state {
                info!(
                    state = snapshot.state,
                    buffered_bytes = snapshot.buffered_bytes,
                    position = snapshot.timeline.position,
                    turn = snapshot.current_turn,
                    "Player state"
                );
                last_state = snapshot.state;
            }
        }
    })
}

fn spawn_stdin_commands(commands: mpsc::Sender<PlayerCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Ok(Some(command)) => {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(message) => eprintln!("{message}"),
            }
        }
    })
}

/// Parse one line of interactive input. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<PlayerCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let number = |parts: &mut std::str::SplitWhitespace<'_>| {
        parts
            .next()
            .and_then(|value| value.parse::<f64>().ok())
            .ok_or_else(|| format!("'{verb}' needs a number"))
    };

    let command = match verb {
        "p" | "play" => PlayerCommand::Play,
        "pause" => PlayerCommand::Pause,
        "q" | "stop" => PlayerCommand::Stop,
        "l" | "live" => PlayerCommand::ReturnToLive,
        "r" | "rate" => PlayerCommand::SetRate(number(&mut parts)?),
        "s" | "skip" => PlayerCommand::Skip(number(&mut parts)?),
        "seek" => PlayerCommand::ScrubRelease(number(&mut parts)?),
        other => return Err(format!("Unknown command '{other}'")),
    };
    Ok(Some(command))
}

fn report(outcome: &PlayerOutcome) {
    println!();
    println!(
        "Received {} of {} turns, {} bytes ({:.1}s)",
        outcome.segments_completed,
        outcome
            .total_turns
            .map_or_else(|| "?".to_string(), |n| n.to_string()),
        outcome.history.total_bytes(),
        outcome.history.duration_secs()
    );
    if let Some(trigger) = outcome.start_trigger {
        println!("Playback started by {trigger:?}");
    }
    if outcome.evictions > 0 {
        println!("Evicted buffered audio {} times", outcome.evictions);
    }
    for failure in &outcome.turn_errors {
        println!("Turn {} failed: {}", failure.turn + 1, failure.message);
    }
}

/// Write each received turn to `dir`. Mp3 streams also get the whole
/// episode in one file.
pub async fn export_turns(
    history: &HistoryLog,
    dir: &Path,
    format: WireFormat,
) -> Result<Vec<PathBuf>, CliError> {
    tokio::fs::create_dir_all(dir).await?;
    let ext = format.extension();
    let mut written = Vec::new();

    for turn in history.turns() {
        let path = dir.join(format!("turn-{turn:03}.{ext}"));
        tokio::fs::write(&path, history.turn_audio(turn)).await?;
        written.push(path);
    }

    if format == WireFormat::Mp3 && !history.is_empty() {
        let path = dir.join(format!("episode.{ext}"));
        tokio::fs::write(&path, history.audio()).await?;
        written.push(path);
    }

    info!(files = written.len(), dir = %dir.display(), "Exported audio");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use clap::Parser;
    use pulsecast_core::Chunk;
    use std::io::Write;

    fn history() -> HistoryLog {
        let mut log = HistoryLog::new(32_000);
        log.record(&Chunk::new(0, 0, Bytes::from_static(b"aa")));
        log.record(&Chunk::new(0, 1, Bytes::from_static(b"bb")));
        log.record(&Chunk::new(2, 0, Bytes::from_static(b"cc")));
        log
    }

    #[test]
    fn script_from_lines() {
        let lines = vec!["hi mark".to_string(), "hi rahil".to_string()];
        assert_eq!(load_script(None, &lines).unwrap(), lines);
        assert!(matches!(
            load_script(None, &[]),
            Err(CliError::Arguments(msg)) if msg == "No script provided"
        ));
    }

    #[test]
    fn script_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["hi mark", "bye"]"#).unwrap();
        let script = load_script(Some(file.path()), &[]).unwrap();
        assert_eq!(script, vec!["hi mark", "bye"]);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"script": 1}}"#).unwrap();
        assert!(matches!(
            load_script(Some(bad.path()), &[]),
            Err(CliError::Arguments(msg)) if msg == "Invalid script format"
        ));

        let missing = load_script(Some(Path::new("/nonexistent/script.json")), &[]);
        assert!(matches!(missing, Err(CliError::Io(_))));
    }

    #[test]
    fn settings_follow_wire_format() {
        let cli = crate::parser::Cli::parse_from([
            "pulsecast",
            "listen",
            "--line",
            "hi",
            "--format",
            "wav",
            "--start-threshold",
            "4000",
        ]);
        let crate::commands::Commands::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        let settings = player_settings(&args, PlayerSettings::default()).unwrap();
        assert_eq!(settings.mime_type, "audio/wav");
        assert_eq!(settings.byte_rate, 32_000);
        assert_eq!(settings.start_threshold, 4000);

        let cli = crate::parser::Cli::parse_from([
            "pulsecast", "listen", "--line", "hi", "--rate", "3.0",
        ]);
        let crate::commands::Commands::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert!(matches!(
            player_settings(&args, PlayerSettings::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("  "), Ok(None));
        assert_eq!(parse_command("p"), Ok(Some(PlayerCommand::Play)));
        assert_eq!(parse_command("pause"), Ok(Some(PlayerCommand::Pause)));
        assert_eq!(parse_command("r 1.5"), Ok(Some(PlayerCommand::SetRate(1.5))));
        assert_eq!(parse_command("s -10"), Ok(Some(PlayerCommand::Skip(-10.0))));
        assert_eq!(
            parse_command("seek 3"),
            Ok(Some(PlayerCommand::ScrubRelease(3.0)))
        );
        assert_eq!(parse_command("live"), Ok(Some(PlayerCommand::ReturnToLive)));
        assert!(parse_command("r fast").is_err());
        assert!(parse_command("rewind").is_err());
    }

    #[test]
    fn server_errors_prefer_json_message() {
        assert_eq!(
            server_error_message(r#"{"error":"No script provided","status":400}"#),
            "No script provided"
        );
        assert_eq!(server_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn export_writes_one_file_per_turn() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_turns(&history(), dir.path(), WireFormat::Wav)
            .await
            .unwrap();

        assert_eq!(
            written,
            vec![dir.path().join("turn-000.wav"), dir.path().join("turn-002.wav")]
        );
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"aabb");
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"cc");
    }

    #[tokio::test]
    async fn mp3_export_includes_episode() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let written = export_turns(&history(), &out, WireFormat::Mp3)
            .await
            .unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read(out.join("episode.mp3")).unwrap(), b"aabbcc");
    }
}
