//! Retrying execution helpers on top of an [`SshExecutor`]

use crate::config::SshConfig;
use crate::executor::{CommandOutput, OutputMode, RETCODE_NOT_REACHABLE, SshExecutor};
use safescale_utils::concurrency::Task;
use safescale_utils::retry::{Action, Verdict};
use safescale_utils::scerr::{Error, Result};
use safescale_utils::temporal::Timeouts;
use std::time::Duration;
use tracing::{debug, info};

/// Effective `(connection, execution)` timeouts of a remote command
///
/// The execution timeout is at least the host timeout and the connection
/// timeout at least the default connection timeout. A connection timeout
/// longer than the execution timeout is clamped to the execution timeout plus
/// the context margin.
pub fn normalize_timeouts(
    timeouts: &Timeouts,
    connection: Duration,
    execution: Duration,
) -> (Duration, Duration) {
    let execution = execution.max(timeouts.host);
    let mut connection = connection.max(timeouts.connection);
    if connection > execution {
        connection = execution + timeouts.context;
    }
    (connection, execution)
}

/// Run `command` on a host, retrying while ssh cannot reach it
///
/// Return codes other than 255 are returned as is in the output; 255 is
/// retried until the connection timeout elapses.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    executor: &dyn SshExecutor,
    task: Option<&Task>,
    config: &SshConfig,
    command: &str,
    mode: OutputMode,
    connection: Duration,
    execution: Duration,
    timeouts: &Timeouts,
) -> Result<CommandOutput> {
    let (connection, execution) = normalize_timeouts(timeouts, connection, execution);
    let hostname = config.hostname().to_string();

    let mut action =
        Action::while_unsuccessful_where_retcode255(timeouts.default_delay, connection).notify(
            move |_, verdict| {
                if verdict == Verdict::Retry {
                    info!(
                        "Remote SSH service on host '{}' isn't ready, retrying...",
                        hostname
                    );
                }
            },
        );
    if let Some(task) = task {
        action = action.within(task);
    }

    action
        .run(move || async move {
            let output = executor
                .run(config, command, mode, connection, execution)
                .await?;
            if output.retcode == RETCODE_NOT_REACHABLE {
                Err(Error::execution(
                    format!(
                        "ssh to '{}' failed: {}",
                        config.hostname(),
                        output.stderr.trim()
                    ),
                    RETCODE_NOT_REACHABLE,
                ))
            } else {
                Ok(output)
            }
        })
        .await
        .map_err(|e| e.wrap(format!("failed to run command on '{}'", config.hostname())))
}

/// Wait until a host answers a trivial command, for at most `timeout`
pub async fn wait_ready(
    executor: &dyn SshExecutor,
    task: Option<&Task>,
    config: &SshConfig,
    timeouts: &Timeouts,
    timeout: Duration,
) -> Result<()> {
    debug!("Waiting for SSH on '{}'", config.hostname());
    let (connection, execution) = normalize_timeouts(timeouts, timeouts.connection, timeouts.connection);

    let mut action = Action::while_unsuccessful(timeouts.default_delay, timeout);
    if let Some(task) = task {
        action = action.within(task);
    }

    action
        .run(move || async move {
            let output = executor
                .run(config, "true", OutputMode::Collect, connection, execution)
                .await?;
            if output.is_success() {
                Ok(())
            } else {
                Err(Error::not_available(format!(
                    "host '{}' is not ready yet (retcode {})",
                    config.hostname(),
                    output.retcode
                ))
                .with_retcode(output.retcode))
            }
        })
        .await
        .map_err(|e| e.wrap(format!("host '{}' never became ready", config.hostname())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use safescale_utils::scerr::ErrorKind;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted return codes, then 0
    struct Scripted {
        retcodes: Mutex<VecDeque<i32>>,
        calls: Mutex<Vec<(Duration, Duration)>>,
    }

    impl Scripted {
        fn new(retcodes: &[i32]) -> Self {
            Self {
                retcodes: Mutex::new(retcodes.iter().copied().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SshExecutor for Scripted {
        async fn run(
            &self,
            _config: &SshConfig,
            _command: &str,
            _mode: OutputMode,
            connection: Duration,
            execution: Duration,
        ) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push((connection, execution));
            let retcode = self.retcodes.lock().unwrap().pop_front().unwrap_or(0);
            Ok(CommandOutput {
                retcode,
                stdout: "ok".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn fast_timeouts() -> Timeouts {
        Timeouts {
            default_delay: Duration::from_millis(1),
            host: Duration::from_millis(200),
            connection: Duration::from_millis(50),
            context: Duration::from_millis(10),
            ..Timeouts::default()
        }
    }

    #[test]
    fn test_normalize_raises_to_defaults() {
        let timeouts = Timeouts::default();
        let (conn, exec) =
            normalize_timeouts(&timeouts, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(exec, timeouts.host);
        assert_eq!(conn, timeouts.connection);
    }

    #[test]
    fn test_normalize_clamps_connection() {
        let timeouts = Timeouts::default();
        let exec = timeouts.host + Duration::from_secs(60);
        let (conn, exec_out) = normalize_timeouts(&timeouts, exec * 2, exec);
        assert_eq!(exec_out, exec);
        assert_eq!(conn, exec + timeouts.context);
    }

    #[smol_potat::test]
    async fn test_retcode_255_is_retried() {
        let executor = Scripted::new(&[255, 255, 0]);
        let config = SshConfig::new("demo-master-1", "10.0.0.5");
        let output = run(
            &executor,
            None,
            &config,
            "hostname",
            OutputMode::Collect,
            Duration::from_secs(1),
            Duration::from_secs(1),
            &fast_timeouts(),
        )
        .await
        .unwrap();

        assert_eq!(output.retcode, 0);
        assert_eq!(executor.calls.lock().unwrap().len(), 3);
    }

    #[smol_potat::test]
    async fn test_other_retcodes_are_returned() {
        let executor = Scripted::new(&[3]);
        let config = SshConfig::new("demo-master-1", "10.0.0.5");
        let output = run(
            &executor,
            None,
            &config,
            "false",
            OutputMode::Collect,
            Duration::ZERO,
            Duration::ZERO,
            &fast_timeouts(),
        )
        .await
        .unwrap();

        assert_eq!(output.retcode, 3);
        assert_eq!(executor.calls.lock().unwrap().len(), 1);
    }

    #[smol_potat::test]
    async fn test_unreachable_host_times_out() {
        let executor = Scripted::new(&[255; 10_000]);
        let config = SshConfig::new("demo-node-1", "10.0.0.9");
        let err = run(
            &executor,
            None,
            &config,
            "true",
            OutputMode::Collect,
            Duration::ZERO,
            Duration::ZERO,
            &fast_timeouts(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.retcode(), Some(255));
    }

    #[smol_potat::test]
    async fn test_unreachable_host_gives_up_after_connection_timeout() {
        let executor = Scripted::new(&[255; 100_000]);
        let config = SshConfig::new("demo-node-1", "10.0.0.9");
        let started = std::time::Instant::now();
        let err = run(
            &executor,
            None,
            &config,
            "true",
            OutputMode::Collect,
            Duration::from_millis(50),
            Duration::from_secs(5),
            &fast_timeouts(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        let calls = executor.calls.lock().unwrap();
        assert!(calls.iter().all(|call| *call == (Duration::from_millis(50), Duration::from_secs(5))));
    }

    #[smol_potat::test]
    async fn test_wait_ready() {
        let executor = Scripted::new(&[255, 1, 0]);
        let config = SshConfig::new("demo-node-1", "10.0.0.9");
        wait_ready(
            &executor,
            None,
            &config,
            &fast_timeouts(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(executor.calls.lock().unwrap().len(), 3);
    }
}
