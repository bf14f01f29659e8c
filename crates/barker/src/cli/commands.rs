//! CLI command definitions.

use barker::Channel;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Barker - posting automation with windowed scheduling, rotation and engagement replies
#[derive(Parser, Debug)]
#[command(name = "barker")]
#[command(about = "Posting automation with windowed scheduling, rotation and engagement replies", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State document location, overriding `state_path`
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler with dry-run adapters until Ctrl-C
    Run {
        /// Catalog file or directory of `*.json` catalog files
        #[arg(long, default_value = "content")]
        content: PathBuf,
    },

    /// Show per-channel counters and pending actions
    Status {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Audit posting gaps for machine-regular patterns
    Audit {
        /// Only this channel
        #[arg(long)]
        channel: Option<Channel>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Show engagement statistics
    Stats {
        /// Only this channel
        #[arg(long)]
        channel: Option<Channel>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Load and validate the configuration, then print it
    CheckConfig {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
