//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Stream two-host podcasts while they are being synthesized.
#[derive(Parser)]
#[command(name = "pulsecast")]
#[command(about = "Stream synthesized podcasts turn by turn")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    #[must_use]
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Backend, WireFormat};
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_args() {
        let cli = Cli::parse_from([
            "pulsecast",
            "serve",
            "--backend",
            "tone",
            "--port",
            "9000",
            "--allow-origin",
            "http://localhost:3000",
            "--allow-origin",
            "http://localhost:5173",
            "--pacing-ms",
            "0",
        ]);
        let Commands::Serve(ref args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.backend, Backend::Tone);
        assert_eq!(args.port, 9000);
        assert_eq!(args.allow_origins.len(), 2);
        assert_eq!(args.pacing_ms, Some(0));
        assert_eq!(cli.default_log_filter(), "info");
    }

    #[test]
    fn test_listen_args() {
        let cli = Cli::parse_from([
            "pulsecast",
            "-v",
            "listen",
            "--line",
            "hi mark",
            "--line",
            "hi rahil",
            "--format",
            "wav",
            "--out",
            "/tmp/episode",
        ]);
        assert_eq!(cli.default_log_filter(), "debug");
        let Commands::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.lines, vec!["hi mark", "hi rahil"]);
        assert_eq!(args.format, WireFormat::Wav);
        assert_eq!(args.format.byte_rate(), 32_000);
        assert!(!args.interactive);
    }

    #[test]
    fn test_script_and_lines_conflict() {
        let result = Cli::try_parse_from([
            "pulsecast",
            "listen",
            "--script",
            "episode.json",
            "--line",
            "hi",
        ]);
        assert!(result.is_err());
    }
}
