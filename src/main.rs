//! Rateview - shared exchange-rate viewer
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use rateview::cli::{Cli, Commands};
use rateview::config::ConfigManager;
use rateview::error::RateviewResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RateviewResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("rateview=warn"),
        1 => EnvFilter::new("rateview=info"),
        _ => EnvFilter::new("rateview=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    // Dispatch to command
    match cli.command {
        Commands::Show(args) => rateview::cli::commands::show(args, &config).await,
        Commands::Config(args) => {
            rateview::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
