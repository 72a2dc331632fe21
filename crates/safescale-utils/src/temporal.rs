//! Timeouts and delays used across SafeScale
//!
//! Every value has a default and can be overridden from the environment, in
//! seconds (`90`) or as a humantime duration (`500ms`, `30s`, `5m`, `1h`).
//! Settings files use humantime strings.

use crate::scerr::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`Timeouts::host`]
pub const ENV_HOST_TIMEOUT: &str = "SAFESCALE_HOST_TIMEOUT";
/// Environment variable overriding [`Timeouts::host_creation`]
pub const ENV_HOST_CREATION_TIMEOUT: &str = "SAFESCALE_HOST_CREATION_TIMEOUT";
/// Environment variable overriding [`Timeouts::connection`]
pub const ENV_CONNECTION_TIMEOUT: &str = "SAFESCALE_CONNECTION_TIMEOUT";
/// Environment variable overriding [`Timeouts::execution`]
pub const ENV_EXECUTION_TIMEOUT: &str = "SAFESCALE_EXECUTION_TIMEOUT";
/// Environment variable overriding [`Timeouts::context`]
pub const ENV_CONTEXT_TIMEOUT: &str = "SAFESCALE_CONTEXT_TIMEOUT";
/// Environment variable overriding [`Timeouts::ssh_connect`]
pub const ENV_SSH_CONNECT_TIMEOUT: &str = "SAFESCALE_SSH_CONNECT_TIMEOUT";

/// Timeouts and delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Upper bound for operations on an existing host
    #[serde(with = "humantime_serde")]
    pub host: Duration,
    /// Upper bound for a host creation
    #[serde(with = "humantime_serde")]
    pub host_creation: Duration,
    /// Default SSH connection timeout
    #[serde(with = "humantime_serde")]
    pub connection: Duration,
    /// Default remote command execution timeout
    #[serde(with = "humantime_serde")]
    pub execution: Duration,
    /// Margin added to an execution timeout when a connection timeout is clamped
    #[serde(with = "humantime_serde")]
    pub context: Duration,
    /// Time allowed for SSH to come up on a freshly created host
    #[serde(with = "humantime_serde")]
    pub ssh_connect: Duration,
    /// Long delay, used as the time budget of the default arbiter
    #[serde(with = "humantime_serde")]
    pub big_delay: Duration,
    /// Delay between two attempts of a retry loop
    #[serde(with = "humantime_serde")]
    pub default_delay: Duration,
    /// Age after which a persisted cluster state is probed again
    #[serde(with = "humantime_serde")]
    pub state_collect_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            host: Duration::from_secs(5 * 60),
            host_creation: Duration::from_secs(8 * 60),
            connection: Duration::from_secs(30),
            execution: Duration::from_secs(5 * 60),
            context: Duration::from_secs(60),
            ssh_connect: Duration::from_secs(3 * 60),
            big_delay: Duration::from_secs(30),
            default_delay: Duration::from_secs(1),
            state_collect_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl Timeouts {
    /// Defaults with overrides read from the process environment
    pub fn from_env() -> Self {
        let mut timeouts = Self::default();
        timeouts.apply_overrides(|key| std::env::var(key).ok());
        timeouts
    }

    /// Apply overrides obtained from `lookup`; unparsable values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let slots: [(&str, &mut Duration); 6] = [
            (ENV_HOST_TIMEOUT, &mut self.host),
            (ENV_HOST_CREATION_TIMEOUT, &mut self.host_creation),
            (ENV_CONNECTION_TIMEOUT, &mut self.connection),
            (ENV_EXECUTION_TIMEOUT, &mut self.execution),
            (ENV_CONTEXT_TIMEOUT, &mut self.context),
            (ENV_SSH_CONNECT_TIMEOUT, &mut self.ssh_connect),
        ];
        for (key, slot) in slots {
            if let Some(raw) = lookup(key) {
                match parse_duration(&raw) {
                    Ok(value) => *slot = value,
                    Err(e) => warn!("Ignoring {}: {}", key, e),
                }
            }
        }
    }
}

/// Parse bare seconds (`90`) or a humantime duration (`500ms`, `30s`, `5m`, `1h 30m`)
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| Error::invalid_parameter("duration", format!("'{}': {}", raw, e)));
    }
    humantime::parse_duration(raw)
        .map_err(|e| Error::invalid_parameter("duration", format!("'{}': {}", raw, e)))
}
