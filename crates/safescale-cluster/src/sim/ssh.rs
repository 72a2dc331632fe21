//! Scripted SSH executor

use async_trait::async_trait;
use safescale_ssh::{CommandOutput, OutputMode, RETCODE_NOT_REACHABLE, SshConfig, SshExecutor};
use safescale_utils::scerr::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Script {
    unreachable: HashSet<String>,
    failing: HashMap<String, i32>,
    commands: Vec<(String, String)>,
}

/// SSH executor answering from a script
///
/// Unreachable hosts answer 255; commands containing a failing pattern answer
/// the configured return code; everything else succeeds.
#[derive(Debug, Default)]
pub struct SimSsh {
    script: Mutex<Script>,
}

impl SimSsh {
    /// Executor where every host answers
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make host `hostname` unreachable
    pub fn set_unreachable(&self, hostname: impl Into<String>) {
        self.lock().unreachable.insert(hostname.into());
    }

    /// Make host `hostname` reachable again
    pub fn set_reachable(&self, hostname: &str) {
        self.lock().unreachable.remove(hostname);
    }

    /// Answer `retcode` to every command containing `pattern`
    pub fn fail_command(&self, pattern: impl Into<String>, retcode: i32) {
        self.lock().failing.insert(pattern.into(), retcode);
    }

    /// `(hostname, command)` pairs run so far, probes included
    pub fn commands(&self) -> Vec<(String, String)> {
        self.lock().commands.clone()
    }

    /// Commands run on `hostname`, probes excluded
    pub fn commands_on(&self, hostname: &str) -> Vec<String> {
        self.lock()
            .commands
            .iter()
            .filter(|(host, command)| host == hostname && command != "true")
            .map(|(_, command)| command.clone())
            .collect()
    }
}

#[async_trait]
impl SshExecutor for SimSsh {
    async fn run(
        &self,
        config: &SshConfig,
        command: &str,
        _mode: OutputMode,
        _connection_timeout: Duration,
        _execution_timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut script = self.lock();
        script
            .commands
            .push((config.hostname().to_string(), command.to_string()));

        let retcode = if script.unreachable.contains(config.hostname()) {
            RETCODE_NOT_REACHABLE
        } else {
            script
                .failing
                .iter()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, retcode)| *retcode)
                .unwrap_or(0)
        };
        Ok(CommandOutput {
            retcode,
            stdout: String::new(),
            stderr: if retcode == 0 {
                String::new()
            } else {
                format!("{}: exit status {}", command, retcode)
            },
        })
    }
}
