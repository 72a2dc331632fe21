//! SSH executor backed by the `ssh` command line client

use crate::config::SshConfig;
use crate::executor::{CommandOutput, OutputMode, SshExecutor};
use async_io::Timer;
use async_process::{Command, Stdio};
use async_trait::async_trait;
use futures::future::{Either, select};
use safescale_utils::scerr::{Error, Result};
use std::pin::pin;
use std::time::Duration;
use tracing::debug;

/// Runs commands through the system `ssh` binary
#[derive(Debug, Clone)]
pub struct SshCli {
    binary: String,
}

impl SshCli {
    /// Use `ssh` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: "ssh".to_string(),
        }
    }

    /// Use a specific ssh binary
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SshCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Options shared by every connection
fn common_options(connection_timeout: Duration) -> Vec<String> {
    let timeout = connection_timeout.as_secs().max(1);
    [
        "BatchMode=yes".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "LogLevel=error".to_string(),
        format!("ConnectTimeout={}", timeout),
    ]
    .into_iter()
    .flat_map(|opt| ["-o".to_string(), opt])
    .collect()
}

/// Arguments of the ssh client, without the remote command
pub fn build_ssh_args(config: &SshConfig, connection_timeout: Duration) -> Vec<String> {
    let mut args = common_options(connection_timeout);

    args.push("-p".to_string());
    args.push(config.port().to_string());

    if let Some(identity) = config.identity_file() {
        args.push("-i".to_string());
        args.push(identity.to_string_lossy().to_string());
    }

    if let Some(gateway) = config.gateway() {
        let mut jump = gateway.destination();
        if gateway.port() != 22 {
            jump = format!("{}:{}", jump, gateway.port());
        }
        args.push("-J".to_string());
        args.push(jump);
    }

    for arg in config.extra_args() {
        args.push(arg.clone());
    }

    args.push(config.destination());
    args
}

/// Wrap a shell command so the remote side runs it with bash
pub fn format_remote_command(command: &str) -> String {
    format!("bash -c {}", shell_escape(command))
}

/// Escape a string for safe inclusion in a shell command
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.contains(|c: char| c.is_whitespace() || "\"'\\$`!*?<>|&;()[]{}#~".contains(c)) {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    } else {
        s.to_string()
    }
}

#[async_trait]
impl SshExecutor for SshCli {
    async fn run(
        &self,
        config: &SshConfig,
        command: &str,
        mode: OutputMode,
        connection_timeout: Duration,
        execution_timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(build_ssh_args(config, connection_timeout))
            .arg(format_remote_command(command))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Running on '{}': {}", config.hostname(), command);

        let launch_error = |e: std::io::Error| {
            Error::execution(
                format!("failed to launch ssh to '{}': {}", config.hostname(), e),
                -1,
            )
        };

        let run = async {
            match mode {
                OutputMode::Collect => {
                    let output = cmd
                        .stdout(Stdio::piped())
                        .stderr(Stdio::piped())
                        .output()
                        .await
                        .map_err(launch_error)?;
                    Ok(CommandOutput {
                        retcode: output.status.code().unwrap_or(-1),
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    })
                }
                OutputMode::Display => {
                    let status = cmd
                        .stdout(Stdio::inherit())
                        .stderr(Stdio::inherit())
                        .status()
                        .await
                        .map_err(launch_error)?;
                    Ok(CommandOutput {
                        retcode: status.code().unwrap_or(-1),
                        ..CommandOutput::default()
                    })
                }
            }
        };

        match select(pin!(run), Timer::after(execution_timeout)).await {
            Either::Left((outcome, _)) => outcome,
            Either::Right(_) => Err(Error::timeout(format!(
                "command on '{}' did not complete within {:?}",
                config.hostname(),
                execution_timeout
            ))),
        }
    }
}
