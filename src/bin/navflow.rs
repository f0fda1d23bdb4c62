//! Navflow CLI Binary
//!
//! Prints the effective configuration and replays navigation scenarios.

use anyhow::{Context, Result};
use clap::Parser;
use navflow::cli::{Cli, RunContext};
use navflow::config::{ConfigLoader, NavflowConfig};
use navflow::logging::init_logging;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    // Initialize logging early
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Navflow CLI starting");

    match run(&cli, config) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli, config: NavflowConfig) -> Result<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .context("building runtime")?;
    let context = RunContext::new(config);
    runtime.block_on(context.execute(&cli.command))
}

/// Load configuration, then apply logging flags.
/// Precedence: CLI flags override env vars override config files override defaults.
fn build_config(cli: &Cli) -> Result<NavflowConfig> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.logging.format = format.clone();
    }

    Ok(config)
}
