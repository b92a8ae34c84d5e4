//! OpenAI text-to-speech backend.

use async_trait::async_trait;
use bytes::Bytes;
use pulsecast_core::{SpeechSynthesizer, SynthesisError};
use serde::{Deserialize, Serialize};

/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default speech model.
pub const DEFAULT_MODEL: &str = "tts-1";

/// Voices the speech endpoint accepts.
pub const VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

/// Connection settings for [`OpenAiSpeech`].
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            model: default_model(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Calls `POST {base_url}/v1/audio/speech` once per turn and returns mp3.
#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url)
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, SynthesisError> {
        if !VOICES.contains(&voice) {
            return Err(SynthesisError::UnknownVoice(voice.to_string()));
        }

        let body = SpeechRequest {
            model: &self.config.model,
            voice,
            input: text,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body: extract_error_message(&body_text),
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        tracing::debug!(voice, chars = text.len(), bytes = audio.len(), "OpenAI speech received");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
