//! Environment source: NAVFLOW_<SECTION>__<KEY>, e.g. NAVFLOW_QUEUE__MIN_INTERVAL_MS

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, Map};

/// Add the environment source. `vars` replaces the process environment (tests).
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("NAVFLOW")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars),
    )
}
