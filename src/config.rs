//! Configuration System
//!
//! Layered configuration for the queue, the loader and logging: built-in
//! defaults, the global config file, an optional explicit file, then
//! `NAVFLOW_*` environment variables.

use crate::coordinator::LoaderConfig;
use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::queue::QueueConfig;
use config::{File, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavflowConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Queue(String),
    Loader(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Queue(msg) => write!(f, "queue: {}", msg),
            ValidationError::Loader(msg) => write!(f, "loader: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl NavflowConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.queue.validate() {
            errors.push(ValidationError::Queue(e));
        }
        if let Err(e) = self.loader.validate() {
            errors.push(ValidationError::Loader(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Load(e.to_string()))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from every source.
    pub fn load(explicit: Option<&Path>) -> Result<NavflowConfig, ConfigError> {
        Self::load_with_env(explicit, None)
    }

    /// Load defaults plus a single file, ignoring the global file and environment.
    pub fn load_from_file(path: &Path) -> Result<NavflowConfig, ConfigError> {
        let config = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize::<NavflowConfig>()?;
        Self::validated(config)
    }

    /// Like [`Self::load`], with `env` standing in for the process environment
    /// when given.
    pub fn load_with_env(
        explicit: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<NavflowConfig, ConfigError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = sources::environment::add_to_builder(builder, env);

        let config = builder.build()?.try_deserialize::<NavflowConfig>()?;
        Self::validated(config)
    }

    fn validated(config: NavflowConfig) -> Result<NavflowConfig, ConfigError> {
        config.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ConfigError::Invalid(msgs.join("\n"))
        })?;
        Ok(config)
    }
}
