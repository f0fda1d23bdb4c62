//! CLI route: run context and command dispatch.

use crate::cli::parse::Commands;
use crate::config::NavflowConfig;
use crate::simulate::{self, Scenario};
use anyhow::{Context, Result};
use tracing::info;

/// Runtime context for CLI execution: the resolved configuration.
pub struct RunContext {
    config: NavflowConfig,
}

impl RunContext {
    pub fn new(config: NavflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NavflowConfig {
        &self.config
    }

    /// Execute a command and return its printable output.
    ///
    /// Scenarios run on the caller's runtime; the binary builds one with a
    /// paused clock so virtual time advances as soon as everything is idle.
    pub async fn execute(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Config => Ok(self.config.to_toml()?),
            Commands::Simulate { scenario } => {
                let parsed = Scenario::load(scenario)
                    .with_context(|| format!("loading scenario {}", scenario.display()))?;
                info!(scenario = %scenario.display(), "Simulating scenario");
                let entries = simulate::run(&parsed, &self.config).await;
                Ok(simulate::format_timeline(&entries))
            }
        }
    }
}
