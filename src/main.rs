use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repoherald::{Config, Orchestrator, Selection};

#[derive(Parser)]
#[command(name = "repoherald")]
#[command(about = "Monitor GitHub accounts and post new repos to Bluesky")]
#[command(version)]
struct Cli {
    /// Limit to first N accounts (0 = no limit, useful for testing)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Override CHECK_MINUTES from the environment
    #[arg(short, long)]
    minutes: Option<u32>,

    /// Check a single GitHub account by handle (e.g. "nytimes" or "https://github.com/nytimes")
    #[arg(short, long)]
    org: Option<String>,

    /// Display name for the account when using --org (e.g. "Star Tribune")
    #[arg(short, long)]
    name: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }
    info!("Starting repoherald v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config.with_overrides(cli.minutes),
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let selection = Selection::from_args(cli.limit, cli.org, cli.name);

    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            e.report();
            return ExitCode::FAILURE;
        }
    };

    match orchestrator.run(&selection).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}
