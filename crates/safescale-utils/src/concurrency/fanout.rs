//! One worker per target, waited for with a ceiling
//!
//! Workers report into a shared channel. When the ceiling elapses before every
//! worker has reported, the report is marked as timed out and names the
//! targets still pending; those workers keep running in the background.

use super::spawner::Spawner;
use crate::scerr::{Error, ErrorKind, Result};
use async_io::Timer;
use futures::future::{Either, select};
use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a fan-out
#[derive(Debug)]
pub struct FanOutReport<T> {
    /// Targets whose worker succeeded, in completion order
    pub succeeded: Vec<(String, T)>,
    /// Targets whose worker failed, in completion order
    pub failed: Vec<(String, Error)>,
    /// Targets whose worker had not reported when the wait ended
    pub pending: Vec<String>,
    /// Whether the ceiling elapsed before every worker reported
    pub timed_out: bool,
}

impl<T> FanOutReport<T> {
    /// Every worker reported and none failed
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.failed.is_empty() && self.pending.is_empty()
    }

    /// Collapse the report into a single result
    ///
    /// Per-target failures become consequences of the returned error. A
    /// timeout takes precedence over failures.
    pub fn into_result(self, what: &str) -> Result<Vec<(String, T)>> {
        if self.is_success() {
            return Ok(self.succeeded);
        }
        let failures = self
            .failed
            .into_iter()
            .map(|(target, err)| err.wrap(format!("{} failed on '{}'", what, target)));

        if self.timed_out || !self.pending.is_empty() {
            let err = Error::timeout(format!(
                "timeout {} (pending: {})",
                what,
                self.pending.join(", ")
            ));
            return Err(err.with_consequences(failures));
        }

        let failures: Vec<Error> = failures.collect();
        let kind = failures
            .first()
            .map(Error::kind)
            .unwrap_or(ErrorKind::Inconsistent);
        Err(Error::new(
            kind,
            format!("{} failed on {} target(s)", what, failures.len()),
        )
        .with_consequences(failures))
    }
}

/// Run `worker` once per target and wait for all of them, at most `ceiling`
pub async fn fan_out<T, W, Fut>(
    spawner: &dyn Spawner,
    targets: Vec<String>,
    worker: W,
    ceiling: Duration,
) -> FanOutReport<T>
where
    W: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = async_channel::unbounded();
    for target in &targets {
        let work = worker(target.clone());
        let tx = tx.clone();
        let target = target.clone();
        spawner.spawn(Box::pin(async move {
            let outcome = work.await;
            // The receiver is gone once the ceiling elapsed
            let _ = tx.send((target, outcome)).await;
        }));
    }
    drop(tx);

    let mut report = FanOutReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
        pending: targets,
        timed_out: false,
    };
    let mut deadline = Timer::at(Instant::now() + ceiling);

    while !report.pending.is_empty() {
        let recv = pin!(rx.recv());
        match select(recv, &mut deadline).await {
            Either::Left((Ok((target, outcome)), _)) => {
                if let Some(pos) = report.pending.iter().position(|t| *t == target) {
                    report.pending.remove(pos);
                }
                match outcome {
                    Ok(value) => {
                        debug!("Worker for '{}' succeeded", target);
                        report.succeeded.push((target, value));
                    }
                    Err(err) => {
                        debug!("Worker for '{}' failed: {}", target, err);
                        report.failed.push((target, err));
                    }
                }
            }
            Either::Left((Err(_), _)) => {
                warn!(
                    "Workers stopped reporting, {} target(s) left pending",
                    report.pending.len()
                );
                break;
            }
            Either::Right(_) => {
                warn!(
                    "Fan-out ceiling of {:?} elapsed, still pending: {}",
                    ceiling,
                    report.pending.join(", ")
                );
                report.timed_out = true;
                break;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::ThreadSpawner;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("host-{}", i)).collect()
    }

    #[smol_potat::test]
    async fn test_all_succeed() {
        let report = fan_out(
            &ThreadSpawner,
            names(4),
            |name| async move { Ok(name.len()) },
            Duration::from_secs(5),
        )
        .await;

        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 4);
        assert_eq!(report.into_result("start").unwrap().len(), 4);
    }

    #[smol_potat::test]
    async fn test_failures_are_reported_per_target() {
        let report = fan_out(
            &ThreadSpawner,
            names(3),
            |name| async move {
                if name == "host-2" {
                    Err(Error::provider("host refused to stop"))
                } else {
                    Ok(())
                }
            },
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "host-2");

        let err = report.into_result("stop").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.consequences().len(), 1);
    }

    #[smol_potat::test]
    async fn test_ceiling_names_pending_targets() {
        let report = fan_out(
            &ThreadSpawner,
            names(2),
            |name| async move {
                if name == "host-2" {
                    Timer::after(Duration::from_secs(2)).await;
                }
                Ok(())
            },
            Duration::from_millis(100),
        )
        .await;

        assert!(report.timed_out);
        assert_eq!(report.pending, vec!["host-2".to_string()]);
        let err = report.into_result("deleting buckets").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("host-2"));
    }
}
