//! SSE delivery of podcast sessions.
//!
//! `GET /api/podcast/stream?script=<url-encoded JSON array>` and
//! `POST /api/podcast/stream` both validate the script up front, so a bad
//! request gets a JSON 400 instead of an event stream.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::Stream;
use pulsecast_core::{StreamEvent, VoiceAssignment};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::HttpError;
use crate::sse::{session_events, sse_response};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// JSON array of turn texts.
    pub script: Option<String>,
}

/// Per-session voice choice. Missing hosts keep the server default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceOverrides {
    pub host1: Option<String>,
    pub host2: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub script: Vec<String>,
    #[serde(default)]
    pub voices: Option<VoiceOverrides>,
}

/// `GET /api/podcast/stream`
pub async fn stream_get(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Query(query) = query?;
    let raw = query
        .script
        .ok_or_else(|| HttpError::BadRequest("No script provided".to_string()))?;
    let lines = parse_script_param(&raw)?;
    let events = start_session(&state, lines, None)?;
    Ok(sse_response(events))
}

/// `POST /api/podcast/stream`
pub async fn stream_post(
    State(state): State<AppState>,
    body: Result<Json<StreamRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(request) = body?;
    let events = start_session(&state, request.script, request.voices)?;
    Ok(sse_response(events))
}

fn parse_script_param(raw: &str) -> Result<Vec<String>, HttpError> {
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|_| HttpError::BadRequest("Invalid script format".to_string()))
}

fn resolve_voices(defaults: &VoiceAssignment, overrides: Option<VoiceOverrides>) -> VoiceAssignment {
    let overrides = overrides.unwrap_or_default();
    VoiceAssignment {
        host1: overrides.host1.unwrap_or_else(|| defaults.host1.clone()),
        host2: overrides.host2.unwrap_or_else(|| defaults.host2.clone()),
    }
}

/// Validate `lines` and spawn a session, returning its events.
pub(crate) fn start_session(
    state: &AppState,
    lines: Vec<String>,
    voices: Option<VoiceOverrides>,
) -> Result<impl Stream<Item = StreamEvent> + Send + 'static + use<>, HttpError> {
    let orchestrator = &state.orchestrator;
    let voices = resolve_voices(&orchestrator.settings().voices, voices);
    let script = orchestrator.prepare_with_voices(lines, &voices)?;

    let session_id = Uuid::new_v4();
    tracing::info!(
        session = %session_id,
        turns = script.len(),
        host1 = %voices.host1,
        host2 = %voices.host2,
        "Starting podcast session"
    );

    let handle = orchestrator.start(script, state.shutdown.child_token());
    Ok(session_events(handle, session_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_param_must_be_a_string_array() {
        assert_eq!(
            parse_script_param(r#"["hi mark","hi rahil"]"#).unwrap(),
            vec!["hi mark".to_string(), "hi rahil".to_string()]
        );
        assert!(parse_script_param(r#"{"a":1}"#).is_err());
        assert!(parse_script_param("[1, 2]").is_err());
        assert!(parse_script_param("not json").is_err());
    }

    #[test]
    fn overrides_fall_back_to_defaults() {
        let defaults = VoiceAssignment::default();
        let voices = resolve_voices(
            &defaults,
            Some(VoiceOverrides {
                host1: None,
                host2: Some("echo".to_string()),
            }),
        );
        assert_eq!(voices.host1, defaults.host1);
        assert_eq!(voices.host2, "echo");
        assert_eq!(resolve_voices(&defaults, None), defaults);
    }
}
