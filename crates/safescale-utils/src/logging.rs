//! Log subscriber setup and optional log categories

use crate::config::LoggingSettings;
use crate::scerr::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable listing the optional log categories to enable
pub const ENV_OPTIONAL_LOGS: &str = "SAFESCALE_OPTIONAL_LOGS";

/// Install the global subscriber; `RUST_LOG` takes precedence over `settings.level`
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| Error::invalid_parameter("logging.level", e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(settings.with_target)
        .with_ansi(settings.ansi)
        .try_init()
        .map_err(|e| Error::duplicate(format!("log subscriber already installed: {}", e)))
}

/// Whether the optional log category `key` is enabled in the environment
pub fn is_optional_log_active(key: &str) -> bool {
    std::env::var(ENV_OPTIONAL_LOGS)
        .map(|value| optional_log_listed(&value, key))
        .unwrap_or(false)
}

/// Whether `key` appears in a comma separated list of categories
pub fn optional_log_listed(value: &str, key: &str) -> bool {
    value.split(',').map(str::trim).any(|item| item == key)
}
