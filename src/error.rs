//! Error types for the navigation queue and load coordinator.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an [`EntityFetcher`](crate::fetcher::EntityFetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Backend slow or unreachable; safe to try again.
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Any other failure that retrying will not fix.
    #[error("Fetch failed: {0}")]
    Permanent(String),
}

impl FetchError {
    /// Only transient failures are eligible for another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Rejection reported by a [`DisplaySurface`](crate::surface::DisplaySurface).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Display surface is not ready")]
    NotReady,

    #[error("Display surface is mid-transition: {0}")]
    Transition(String),

    #[error("Unknown navigation target: {0}")]
    UnknownTarget(String),
}

/// A queued intent the display surface refused. Logged and dropped, never retried.
#[derive(Debug, Clone, Error)]
#[error("Navigation intent {intent_id} to '{target}' failed: {source}")]
pub struct NavigationError {
    pub intent_id: u64,
    pub target: String,
    #[source]
    pub source: SurfaceError,
}

/// Terminal outcome of a load, handed to the caller's failure callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// Empty or malformed entity id; no fetch was attempted.
    #[error("Invalid load request: {0}")]
    InvalidRequest(String),

    /// Every attempt failed transiently.
    #[error("Loading '{entity_id}' failed after {attempts} attempts: {last_error}")]
    Exhausted {
        entity_id: String,
        attempts: u32,
        last_error: FetchError,
    },

    /// The fetcher reported a failure that is not worth retrying.
    #[error("Loading '{entity_id}' was rejected: {error}")]
    Rejected { entity_id: String, error: FetchError },

    /// The coordinator went away before the load finished.
    #[error("Load for '{0}' was abandoned")]
    Abandoned(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Configuration validation failed:\n{0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Scenario file errors
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid scenario step {index}: {reason}")]
    InvalidStep { index: usize, reason: String },
}
