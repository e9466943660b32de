//! Tracing subscriber initialization

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::error::{EngineError, Result};

static INIT: Once = Once::new();

/// Install the global tracing subscriber once.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (usually
/// [`crate::config::EngineConfig::log_filter`]). Later calls are no-ops, so
/// demos and tests can call this unconditionally.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => parse_filter(default_filter)?,
    };

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
    Ok(())
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|error| EngineError::Configuration {
        message: error.to_string(),
        parameter: "log_filter".to_string(),
    })
}
