//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Rateview - shared exchange-rate viewer
///
/// Serves an externally fetched rate to any number of concurrent
/// consumers from a single-flight cache: at most one fetch per
/// process, shared by everyone.
#[derive(Parser, Debug)]
#[command(name = "rateview")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "RATEVIEW_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and display the configured rate
    Show(ShowArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Number of concurrent consumers to mount (all share one fetch)
    #[arg(short = 'n', long, default_value = "1")]
    pub consumers: u32,

    /// Print cache statistics after the value settles
    #[arg(long)]
    pub stats: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
