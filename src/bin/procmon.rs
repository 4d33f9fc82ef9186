//! procmon command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use procmon::{Config, Supervisor};

/// Dependency-ordered process supervisor.
#[derive(Parser)]
#[command(name = "procmon", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    config: PathBuf,

    /// Validate the configuration and exit without starting anything.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let raw = match std::fs::read_to_string(&cli.config) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("procmon: cannot read {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::from_toml(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("procmon: {e}");
            return ExitCode::FAILURE;
        }
    };

    procmon::logging::init(&config.logger);

    let supervisor = match Supervisor::build(&config) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        return ExitCode::SUCCESS;
    }

    match supervisor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "supervisor failed");
            ExitCode::FAILURE
        }
    }
}
