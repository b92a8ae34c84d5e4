//! End-to-end player tests: wire events in, buffer state and outcome out.
//!
//! Time is paused so network pacing, the start timeout and the playback tick
//! are all deterministic.

use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use pulsecast_core::{PlayerSettings, Speaker, StreamEvent};
use pulsecast_player::{
    ClockOutput, CloseReason, MemoryMediaBuffer, PlayerCommand, PlayerError, PlayerSession,
    StartTrigger, TurnFailure, decode_sse,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

type Events = ReceiverStream<Result<StreamEvent, PlayerError>>;

fn settings() -> PlayerSettings {
    PlayerSettings {
        start_threshold: 2000,
        start_timeout_ms: 5000,
        byte_rate: 1000,
        buffer_capacity: 64 * 1024,
        tick_ms: 250,
        ..PlayerSettings::default()
    }
}

fn audio(len: usize, fill: u8) -> StreamEvent {
    StreamEvent::Audio {
        data: Bytes::from(vec![fill; len]),
    }
}

/// Send each event after its delay, then hang up.
fn feed(script: Vec<(Duration, StreamEvent)>) -> Events {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        for (delay, event) in script {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }
    });
    ReceiverStream::new(rx)
}

fn now(event: StreamEvent) -> (Duration, StreamEvent) {
    (Duration::ZERO, event)
}

fn no_commands() -> mpsc::Receiver<PlayerCommand> {
    mpsc::channel(1).1
}

// ── Start race ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fast_network_starts_on_threshold() {
    let mut script = vec![now(StreamEvent::metadata(1)), now(StreamEvent::host(Speaker::One))];
    for _ in 0..8 {
        script.push((Duration::from_millis(10), audio(500, 1)));
    }
    script.push(now(StreamEvent::segment_end(0)));
    script.push(now(StreamEvent::complete("done")));

    let mut session = PlayerSession::in_memory(settings()).unwrap().exit_when_drained(true);
    let outcome = session
        .run(feed(script), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::Ended);
    assert_eq!(outcome.start_trigger, Some(StartTrigger::Threshold));
    assert_eq!(outcome.history.total_bytes(), 4000);
    assert_eq!(outcome.segments_completed, 1);
    assert_eq!(outcome.total_turns, Some(1));
}

#[tokio::test(start_paused = true)]
async fn slow_network_starts_on_timeout() {
    let mut script = vec![now(StreamEvent::metadata(1)), now(StreamEvent::host(Speaker::One))];
    for _ in 0..8 {
        script.push((Duration::from_millis(900), audio(200, 1)));
    }
    script.push(now(StreamEvent::segment_end(0)));
    script.push(now(StreamEvent::complete("done")));

    let mut session = PlayerSession::in_memory(settings()).unwrap().exit_when_drained(true);
    let outcome = session
        .run(feed(script), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::Ended);
    assert_eq!(outcome.start_trigger, Some(StartTrigger::Timeout));
    assert_eq!(outcome.history.total_bytes(), 1600);
}

#[tokio::test(start_paused = true)]
async fn short_stream_plays_to_the_end() {
    let script = vec![
        now(StreamEvent::metadata(1)),
        now(StreamEvent::host(Speaker::One)),
        now(audio(500, 1)),
        now(StreamEvent::segment_end(0)),
        now(StreamEvent::complete("done")),
    ];

    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let started = tokio::time::Instant::now();
    let outcome = session
        .run(feed(script), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::Ended);
    assert_eq!(outcome.start_trigger, Some(StartTrigger::StreamComplete));
    // Half a second of audio is played out before the session ends.
    assert!(started.elapsed() >= Duration::from_millis(450));
    assert!(session.timeline().is_frozen());
}

// ── Turns and history ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_turn_is_skipped_and_history_is_per_turn() {
    let script = vec![
        now(StreamEvent::metadata(3)),
        now(StreamEvent::status("Generating audio for turn 1/3", Some(0.0))),
        now(StreamEvent::host(Speaker::One)),
        now(audio(1000, 0)),
        now(audio(200, 0)),
        now(StreamEvent::segment_end(0)),
        now(StreamEvent::status("Generating audio for turn 2/3", Some(33.3))),
        now(StreamEvent::turn_error(1, "Error generating audio: boom")),
        now(StreamEvent::status("Generating audio for turn 3/3", Some(66.7))),
        now(StreamEvent::host(Speaker::One)),
        now(audio(1000, 2)),
        now(StreamEvent::segment_end(2)),
        now(StreamEvent::complete("Podcast streaming completed")),
    ];

    let mut session = PlayerSession::in_memory(settings()).unwrap().exit_when_drained(true);
    let outcome = session
        .run(feed(script), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::Ended);
    assert_eq!(
        outcome.turn_errors,
        vec![TurnFailure {
            turn: 1,
            message: "Error generating audio: boom".to_string(),
        }]
    );
    assert_eq!(outcome.segments_completed, 2);
    assert_eq!(outcome.history.turns(), vec![0, 2]);
    assert_eq!(outcome.history.turn_audio(0), vec![0; 1200]);
    assert_eq!(outcome.history.turn_audio(2), vec![2; 1000]);
    let seqs: Vec<_> = outcome.history.entries().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![0, 1, 0]);
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transport_break_closes_and_releases() {
    let script = vec![
        now(StreamEvent::metadata(3)),
        now(StreamEvent::host(Speaker::One)),
        now(audio(300, 1)),
        now(audio(300, 1)),
    ];

    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let outcome = session
        .run(feed(script), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::TransportLost);
    assert!(outcome.clone().into_result().is_err());

    let manager = session.manager();
    assert!(!manager.start_timer().is_armed());
    assert!(!manager.buffer().is_open());
    assert_eq!(manager.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_error_item_closes_session() {
    let (tx, rx) = mpsc::channel(8);
    tx.send(Ok(StreamEvent::metadata(1))).await.unwrap();
    tx.send(Ok(audio(100, 1))).await.unwrap();
    tx.send(Err(PlayerError::Transport("connection reset".to_string())))
        .await
        .unwrap();

    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let outcome = session
        .run(ReceiverStream::new(rx), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::TransportLost);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn session_error_is_fatal() {
    let script = vec![
        now(StreamEvent::metadata(2)),
        now(StreamEvent::host(Speaker::One)),
        now(audio(100, 1)),
        now(StreamEvent::session_error("synthesizer crashed")),
    ];

    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let outcome = session
        .run(feed(script), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(
        outcome.reason,
        CloseReason::Fatal(PlayerError::Protocol("synthesizer crashed".to_string()))
    );
    assert!(!session.manager().start_timer().is_armed());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_and_disarms() {
    let (tx, rx) = mpsc::channel(8);
    tx.send(Ok(StreamEvent::metadata(1))).await.unwrap();
    tx.send(Ok(audio(100, 1))).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let outcome = session
        .run(ReceiverStream::new(rx), no_commands(), cancel)
        .await;

    assert_eq!(outcome.reason, CloseReason::Stopped);
    assert_eq!(outcome.start_trigger, None);
    assert!(!session.manager().start_timer().is_armed());
    assert!(!session.manager().buffer().is_open());
    // The delivery channel was closed by the player.
    assert!(tx.is_closed());
}

#[test]
fn unsupported_format_fails_to_open() {
    let settings = PlayerSettings {
        mime_type: "audio/flac".to_string(),
        ..settings()
    };
    let err = PlayerSession::in_memory(settings).err();
    assert_eq!(err, Some(PlayerError::UnsupportedFormat("audio/flac".to_string())));
}

// ── User gestures ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn blocked_autoplay_recovers_on_play_command() {
    let settings = settings();
    let (buffer, updates) = MemoryMediaBuffer::new(settings.buffer_capacity, settings.byte_rate);
    let mut session =
        PlayerSession::new(buffer, updates, ClockOutput::requiring_gesture(), settings).unwrap();

    let (events_tx, events_rx) = mpsc::channel(8);
    events_tx.send(Ok(StreamEvent::metadata(1))).await.unwrap();
    events_tx.send(Ok(audio(2500, 1))).await.unwrap();

    let mut snapshots = session.subscribe();
    let watcher = tokio::spawn(async move {
        let mut states = Vec::new();
        while snapshots.changed().await.is_ok() {
            let state = snapshots.borrow_and_update().state;
            if states.last() != Some(&state) {
                states.push(state);
            }
            if state == "closed" {
                break;
            }
        }
        states
    });

    let (commands_tx, commands_rx) = mpsc::channel(8);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        commands_tx.send(PlayerCommand::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        commands_tx.send(PlayerCommand::SetRate(1.5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        commands_tx.send(PlayerCommand::Stop).await.unwrap();
    });

    let outcome = session
        .run(ReceiverStream::new(events_rx), commands_rx, CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::Stopped);
    assert_eq!(outcome.start_trigger, Some(StartTrigger::Threshold));
    let states = watcher.await.unwrap();
    let gesture = states.iter().position(|s| *s == "awaiting_gesture").unwrap();
    let playing = states.iter().position(|s| *s == "playing").unwrap();
    assert!(gesture < playing);
    assert_eq!(states.last(), Some(&"closed"));
    drop(events_tx);
}

// ── SSE delivery ─────────────────────────────────────────────────────────────

fn sse_body(events: &[StreamEvent]) -> Vec<u8> {
    let mut body = b": keep-alive\n\n".to_vec();
    for event in events {
        body.extend_from_slice(
            format!("event: {}\ndata: {}\n\n", event.kind(), event.to_json().unwrap()).as_bytes(),
        );
    }
    body
}

fn split(body: &[u8], size: usize) -> Vec<Result<Bytes, std::io::Error>> {
    body.chunks(size).map(|c| Ok(Bytes::copy_from_slice(c))).collect()
}

#[tokio::test(start_paused = true)]
async fn sse_split_across_reads_reconstructs_audio() {
    let turn0: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    let turn1: Vec<u8> = (0..=255u8).rev().cycle().take(1500).collect();
    let mut events = vec![StreamEvent::metadata(2), StreamEvent::host(Speaker::One)];
    for part in turn0.chunks(1024) {
        events.push(StreamEvent::Audio {
            data: Bytes::copy_from_slice(part),
        });
    }
    events.push(StreamEvent::segment_end(0));
    events.push(StreamEvent::host(Speaker::Two));
    for part in turn1.chunks(1024) {
        events.push(StreamEvent::Audio {
            data: Bytes::copy_from_slice(part),
        });
    }
    events.push(StreamEvent::segment_end(1));
    events.push(StreamEvent::complete("Podcast streaming completed"));

    let body = stream::iter(split(&sse_body(&events), 7));
    let mut session = PlayerSession::in_memory(settings()).unwrap().exit_when_drained(true);
    let outcome = session
        .run(decode_sse(body), no_commands(), CancellationToken::new())
        .await;

    assert_eq!(outcome.reason, CloseReason::Ended);
    assert_eq!(outcome.history.turn_audio(0), turn0);
    assert_eq!(outcome.history.turn_audio(1), turn1);
    assert_eq!(outcome.segments_completed, 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_sse_payload_is_a_decode_failure() {
    let body = stream::iter(split(b"data: {\"type\":\"metadata\",\"turns\":1}\n\ndata: {oops\n\n", 5));
    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let outcome = session
        .run(decode_sse(body), no_commands(), CancellationToken::new())
        .await;

    assert!(matches!(outcome.reason, CloseReason::Fatal(PlayerError::Decode(_))));
}

#[tokio::test(start_paused = true)]
async fn invalid_base64_audio_is_a_decode_failure() {
    let body = stream::iter(split(b"data: {\"type\":\"audio\",\"data\":\"@@@\"}\n\n", 64));
    let mut session = PlayerSession::in_memory(settings()).unwrap();
    let outcome = session
        .run(decode_sse(body), no_commands(), CancellationToken::new())
        .await;

    assert!(matches!(outcome.reason, CloseReason::Fatal(PlayerError::Decode(_))));
}
