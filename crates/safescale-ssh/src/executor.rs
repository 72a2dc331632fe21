//! SSH execution contract

use crate::config::SshConfig;
use async_trait::async_trait;
use safescale_utils::scerr::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Return code of the ssh client when it could not reach the host
pub const RETCODE_NOT_REACHABLE: i32 = 255;

/// What to do with the output of a remote command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// Capture stdout and stderr
    #[default]
    Collect,
    /// Let the output go to the console of the daemon
    Display,
}

/// Outcome of a remote command that ran
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Process return code
    pub retcode: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command returned 0
    pub fn is_success(&self) -> bool {
        self.retcode == 0
    }
}

/// Runs commands on remote hosts
///
/// Implementations return `Ok` whenever the ssh client ran, whatever the
/// return code (255 included), and `Err` when it could not be launched or
/// exceeded `execution_timeout`.
#[async_trait]
pub trait SshExecutor: Send + Sync {
    /// Run `command` on the host described by `config`
    async fn run(
        &self,
        config: &SshConfig,
        command: &str,
        mode: OutputMode,
        connection_timeout: Duration,
        execution_timeout: Duration,
    ) -> Result<CommandOutput>;
}
