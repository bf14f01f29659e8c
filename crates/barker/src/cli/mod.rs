//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the barker binary.

mod commands;
mod inspect;
mod run;

pub use commands::{Cli, Commands, OutputFormat};
pub use inspect::{check_config, show_audit, show_stats, show_status};
pub use run::run_engine;
