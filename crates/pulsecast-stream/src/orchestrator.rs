//! Script orchestrator: sequences per-turn synthesis and emits the ordered
//! event stream for one listener.
//!
//! # Ordering
//!
//! Turns are strictly sequential. Synthesis for turn N+1 is not started
//! until every event of turn N, including its `segment_end` or `error`, has
//! been accepted by the sink.
//!
//! # Failure scopes
//!
//! | Failure | Scope | Effect |
//! |---------|-------|--------|
//! | [`SynthesisError`] | turn | `error(turn)` is emitted, next turn starts |
//! | [`TransportError`](pulsecast_core::TransportError) | session | stop immediately, session `cancelled` |
//! | cancellation token | session | same as a transport failure |

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pulsecast_core::{
    EventSink, Script, SessionState, SpeechSynthesizer, StreamEvent, StreamSession,
    StreamSettings, SynthesisError, Turn, TurnStatus, VoiceAssignment, split_audio,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::channel::{DeliveryReceiver, delivery_channel};
use crate::error::StreamError;

/// Final message of a successful session.
pub const COMPLETE_MESSAGE: &str = "Podcast streaming completed";

// ── Report ───────────────────────────────────────────────────────────────────

/// Outcome of one [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session state at the moment the run ended.
    pub session: StreamSession,
    /// Wall time the run took.
    pub elapsed: Duration,
    /// Why the run stopped early, if it did.
    pub interruption: Option<StreamError>,
}

impl SessionReport {
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn failed_turns(&self) -> usize {
        self.session.failed_turns()
    }

    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.session.total_bytes_emitted()
    }

    /// `Ok` for a completed session, the interruption otherwise.
    pub fn into_result(self) -> Result<Self, StreamError> {
        match self.interruption.clone() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Handle to a session running on its own task.
#[derive(Debug)]
pub struct StreamHandle {
    /// Events of the session, in order.
    pub events: DeliveryReceiver,
    /// Resolves to the session report once the run ends.
    pub task: JoinHandle<SessionReport>,
}

/// Walks a script turn by turn and pushes wire events into an [`EventSink`].
///
/// Cheap to clone; clones share the synthesizer.
#[derive(Clone)]
pub struct Orchestrator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: StreamSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("synthesizer", &self.synthesizer.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator, validating `settings`.
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: StreamSettings,
    ) -> Result<Self, StreamError> {
        settings.validate()?;
        Ok(Self {
            synthesizer,
            settings,
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Validate raw turn texts with the configured voices and turn limit.
    pub fn prepare<I, S>(&self, lines: I) -> Result<Script, StreamError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prepare_with_voices(lines, &self.settings.voices)
    }

    /// Same as [`Orchestrator::prepare`] with per-session voices.
    pub fn prepare_with_voices<I, S>(
        &self,
        lines: I,
        voices: &VoiceAssignment,
    ) -> Result<Script, StreamError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Script::from_lines_with_limit(
            lines,
            voices,
            self.settings.max_turns,
        )?)
    }

    /// Spawn a session on its own task, delivering into a fresh channel.
    ///
    /// The returned receiver cancels `cancel` when dropped.
    pub fn start(&self, script: Script, cancel: CancellationToken) -> StreamHandle {
        let (tx, rx) = delivery_channel(self.settings.channel_capacity);
        let events = rx.cancel_on_drop(cancel.clone());
        let orchestrator = self.clone();
        let task = tokio::spawn(async move { orchestrator.run(script, &tx, cancel).await });
        StreamHandle { events, task }
    }

    /// Stream every turn of `script` into `sink`.
    ///
    /// Always returns a report. A run that ended early carries the reason in
    /// [`SessionReport::interruption`] and has state
    /// [`SessionState::Cancelled`].
    pub async fn run(
        &self,
        script: Script,
        sink: &dyn EventSink,
        cancel: CancellationToken,
    ) -> SessionReport {
        let started = Instant::now();
        let mut session = StreamSession::new(script);
        session.begin();

        tracing::info!(
            turns = session.total_turns(),
            backend = self.synthesizer.name(),
            "Starting stream session"
        );

        let interruption = match self.drive(&mut session, sink, &cancel).await {
            Ok(()) => {
                session.complete();
                None
            }
            Err(err) => {
                session.cancel();
                tracing::warn!(
                    turn = session.cursor(),
                    error = %err,
                    "Stream session interrupted"
                );
                Some(err)
            }
        };
        sink.close();

        let report = SessionReport {
            session,
            elapsed: started.elapsed(),
            interruption,
        };
        tracing::info!(
            state = ?report.state(),
            failed_turns = report.failed_turns(),
            total_bytes = report.total_bytes(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Stream session finished"
        );
        report
    }

    async fn drive(
        &self,
        session: &mut StreamSession,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        let total = session.total_turns();
        emit(sink, cancel, StreamEvent::metadata(total)).await?;

        while let Some(turn) = session.current().cloned() {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }

            let message = format!("Generating audio for turn {}/{total}", turn.index + 1);
            emit(
                sink,
                cancel,
                StreamEvent::status(message, Some(session.progress())),
            )
            .await?;

            session.set_current_status(TurnStatus::Synthesizing);
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamError::Cancelled),
                result = self.synthesize(&turn) => result,
            };

            match result {
                Ok(audio) => {
                    session.set_current_status(TurnStatus::Streaming);
                    self.stream_turn(session, &turn, &audio, sink, cancel)
                        .await?;
                    session.set_current_status(TurnStatus::Done);
                }
                Err(err) => {
                    tracing::warn!(
                        turn = turn.index,
                        voice = %turn.voice_id,
                        error = %err,
                        "Failed to synthesise turn, skipping"
                    );
                    session.set_current_status(TurnStatus::Failed);
                    emit(
                        sink,
                        cancel,
                        StreamEvent::turn_error(
                            turn.index,
                            format!("Error generating audio: {err}"),
                        ),
                    )
                    .await?;
                }
            }

            session.advance();
        }

        emit(sink, cancel, StreamEvent::complete(COMPLETE_MESSAGE)).await
    }

    async fn synthesize(&self, turn: &Turn) -> Result<Bytes, SynthesisError> {
        let timeout = self.settings.synthesis_timeout();
        let audio = tokio::time::timeout(
            timeout,
            self.synthesizer.synthesize(&turn.text, &turn.voice_id),
        )
        .await
        .map_err(|_| {
            SynthesisError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
        })??;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        tracing::debug!(turn = turn.index, bytes = audio.len(), "Synthesised turn");
        Ok(audio)
    }

    async fn stream_turn(
        &self,
        session: &mut StreamSession,
        turn: &Turn,
        audio: &Bytes,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        emit(sink, cancel, StreamEvent::host(turn.speaker)).await?;

        let pacing = self.settings.pacing();
        for chunk in split_audio(turn.index, audio, self.settings.chunk_size) {
            let len = chunk.len();
            emit(sink, cancel, StreamEvent::audio(&chunk)).await?;
            session.record_emitted(len);
            tracing::debug!(turn = turn.index, seq = chunk.seq, bytes = len, "Sent chunk");

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamError::Cancelled),
                () = tokio::time::sleep(pacing) => {}
            }
        }

        emit(sink, cancel, StreamEvent::segment_end(turn.index)).await
    }
}

/// Send one event, treating cancellation like a broken transport.
async fn emit(
    sink: &dyn EventSink,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> Result<(), StreamError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StreamError::Cancelled),
        sent = sink.send(event) => sent.map_err(StreamError::from),
    }
}
