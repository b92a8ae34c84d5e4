//! Subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use pulsecast_axum::DEFAULT_PORT;
use pulsecast_core::settings::DEFAULT_BYTE_RATE;
use pulsecast_stream::backend::tone;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server that streams podcast sessions
    Serve(ServeArgs),

    /// Stream a script from a running server through the headless player
    Listen(ListenArgs),
}

/// Speech synthesis backend used by `serve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// OpenAI `/v1/audio/speech`, mp3 output
    Openai,
    /// Offline sine tones, wav output
    Tone,
}

/// Audio container the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WireFormat {
    Mp3,
    Wav,
}

impl WireFormat {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }

    /// Bytes per second of audio, used to map buffered bytes to time.
    #[must_use]
    pub const fn byte_rate(self) -> u32 {
        match self {
            Self::Mp3 => DEFAULT_BYTE_RATE,
            Self::Wav => tone::BYTE_RATE,
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Synthesis backend
    #[arg(long, value_enum, default_value = "openai", env = "PULSECAST_BACKEND")]
    pub backend: Backend,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PULSECAST_PORT")]
    pub port: u16,

    /// OpenAI API key (required for the openai backend)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the OpenAI API origin
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// OpenAI speech model
    #[arg(long)]
    pub model: Option<String>,

    /// Allowed CORS origin, repeatable. All origins are allowed when omitted
    #[arg(long = "allow-origin")]
    pub allow_origins: Vec<String>,

    /// Voice for host 1
    #[arg(long)]
    pub host1_voice: Option<String>,

    /// Voice for host 2
    #[arg(long)]
    pub host2_voice: Option<String>,

    /// Raw bytes per audio event
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Delay between audio events in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Base URL of a running pulsecast server
    #[arg(
        long,
        default_value = "http://localhost:8787",
        env = "PULSECAST_SERVER"
    )]
    pub server: String,

    /// JSON file holding an array of turn texts
    #[arg(long, conflicts_with = "lines")]
    pub script: Option<PathBuf>,

    /// One turn of the script, repeatable
    #[arg(long = "line")]
    pub lines: Vec<String>,

    /// Voice for host 1
    #[arg(long)]
    pub host1_voice: Option<String>,

    /// Voice for host 2
    #[arg(long)]
    pub host2_voice: Option<String>,

    /// Audio format the server produces
    #[arg(long, value_enum, default_value = "mp3")]
    pub format: WireFormat,

    /// Directory to write one audio file per received turn
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Bytes to buffer before playback starts
    #[arg(long)]
    pub start_threshold: Option<usize>,

    /// Start playback after this many milliseconds regardless of buffer level
    #[arg(long)]
    pub start_timeout_ms: Option<u64>,

    /// Initial playback rate (0.5 to 2.0)
    #[arg(long)]
    pub rate: Option<f64>,

    /// Read player commands from stdin
    #[arg(short, long)]
    pub interactive: bool,
}
