//! Barker CLI binary.
//!
//! This binary provides command-line access to Barker:
//! - Run the scheduler with dry-run adapters
//! - Inspect counters, gap audits and engagement statistics
//! - Validate configuration

use barker::EngineConfig;
use barker::observability::{ObservabilityConfig, init_observability_with_config};
use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, check_config, run_engine, show_audit, show_stats, show_status};

    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    init_observability_with_config(ObservabilityConfig::from_flags(cli.verbose, cli.json))?;

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config = config.with_state_path(state);
    }

    // Execute the requested command
    match cli.command {
        Commands::Run { content } => {
            run_engine(config, &content).await?;
        }

        Commands::Status { format } => {
            show_status(&config, format).await?;
        }

        Commands::Audit { channel, format } => {
            show_audit(&config, channel, format).await?;
        }

        Commands::Stats { channel, format } => {
            show_stats(&config, channel, format).await?;
        }

        Commands::CheckConfig { format } => {
            check_config(&config, format)?;
        }
    }

    Ok(())
}
