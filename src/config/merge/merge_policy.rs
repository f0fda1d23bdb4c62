//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources win key by key: defaults, global file, explicit file,
//! then `NAVFLOW_*` environment variables.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("queue.min_interval_ms", 500_i64)?
        .set_default("queue.max_pending", 256_i64)?
        .set_default("loader.max_attempts", 3_i64)?
        .set_default("loader.base_delay_ms", 1000_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
