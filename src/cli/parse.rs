//! CLI parse: clap types for navflow. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Navflow CLI - throttled navigation queue and load handoff
#[derive(Parser)]
#[command(name = "navflow")]
#[command(about = "Inspect configuration and replay navigation scenarios")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the effective configuration as TOML
    Config,
    /// Replay a scenario file on a virtual clock and print the timeline
    Simulate {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },
}
