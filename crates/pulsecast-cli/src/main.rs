//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulsecast_cli::{Cli, CliError, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Serve(args) => handlers::serve::execute(args).await,
        Commands::Listen(args) => handlers::listen::execute(args).await,
    };

    if let Err(err) = result {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            eprintln!("Error: {cli_err}");
            std::process::exit(cli_err.exit_code());
        }
        return Err(err);
    }
    Ok(())
}
