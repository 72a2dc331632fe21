//! Retry engine
//!
//! An [`Action`] runs an operation, records the attempt in a [`Try`] and asks
//! an [`Arbiter`] what to do next. `Retry` sleeps according to a [`Delay`]
//! policy and loops, `Done` returns the outcome of the last attempt and
//! `Abort` ends the loop with an error carrying the last failure as cause.
//!
//! ```no_run
//! use safescale_utils::retry::Action;
//! use std::time::Duration;
//!
//! # async fn probe() -> safescale_utils::scerr::Result<()> { Ok(()) }
//! # async fn example() -> safescale_utils::scerr::Result<()> {
//! Action::while_unsuccessful(Duration::from_secs(1), Duration::from_secs(30))
//!     .notify(|t, _| tracing::debug!("attempt {} failed", t.count))
//!     .run(probe)
//!     .await
//! # }
//! ```

mod arbiter;
mod delay;

pub use arbiter::{
    Arbiter, Max, PrevailDone, PrevailRetry, Successful, Timeout, Unsuccessful,
    UnsuccessfulWhereRetcode255, default_arbiter,
};
pub use delay::{Constant, Delay, Exponential, Linear};

use crate::concurrency::Task;
use crate::scerr::{Error, Result};
use crate::temporal::Timeouts;
use async_io::Timer;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// State of a retry loop after an attempt
#[derive(Debug)]
pub struct Try {
    /// Number of attempts made so far, 1 after the first one
    pub count: u32,
    /// When the first attempt started
    pub start: Instant,
    /// Error of the last attempt, if it failed
    pub err: Option<Error>,
}

impl Try {
    /// Create an attempt record
    pub fn new(count: u32, start: Instant, err: Option<Error>) -> Self {
        Self { count, start, err }
    }

    /// Time spent since the first attempt started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn into_error(self) -> Error {
        self.err
            .unwrap_or_else(|| Error::inconsistent("attempt produced neither a value nor an error"))
    }
}

/// Decision of an arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Run the operation again
    Retry,
    /// Stop and return the outcome of the last attempt
    Done,
    /// Stop with an error
    Abort(AbortCause),
}

/// Why a loop was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCause {
    /// The time budget elapsed
    Timeout(Duration),
    /// The attempt limit was reached
    MaxAttempts(u32),
    /// The last error must not be retried
    Terminal,
}

type Notify = Box<dyn Fn(&Try, Verdict) + Send + Sync>;

/// Configured retry loop
pub struct Action {
    arbiter: Box<dyn Arbiter>,
    delay: Box<dyn Delay>,
    notify: Option<Notify>,
    task: Option<Task>,
}

impl Action {
    /// Loop driven by `arbiter`, waiting the default delay between attempts
    pub fn new(arbiter: impl Arbiter + 'static) -> Self {
        Self {
            arbiter: Box::new(arbiter),
            delay: Box::new(Constant(Timeouts::default().default_delay)),
            notify: None,
            task: None,
        }
    }

    /// Loop driven by [`default_arbiter`]
    pub fn with_default_arbiter() -> Self {
        Self::new(default_arbiter(Timeouts::default().big_delay))
    }

    /// Retry failures every `delay` until `timeout` elapses
    pub fn while_unsuccessful(delay: Duration, timeout: Duration) -> Self {
        Self::new(crate::prevail_done!(Unsuccessful, Timeout(timeout))).delay(Constant(delay))
    }

    /// Retry failures with return code 255 every `delay` until `timeout` elapses
    pub fn while_unsuccessful_where_retcode255(delay: Duration, timeout: Duration) -> Self {
        Self::new(crate::prevail_done!(
            UnsuccessfulWhereRetcode255,
            Timeout(timeout)
        ))
        .delay(Constant(delay))
    }

    /// Set the delay policy
    pub fn delay(mut self, delay: impl Delay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Call `notify` with every attempt and its verdict
    pub fn notify(mut self, notify: impl Fn(&Try, Verdict) + Send + Sync + 'static) -> Self {
        self.notify = Some(Box::new(notify));
        self
    }

    /// Stop the loop when `task` (or one of its ancestors) is cancelled
    pub fn within(mut self, task: &Task) -> Self {
        self.task = Some(task.clone());
        self
    }

    /// Run `op` until the arbiter stops the loop
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let mut count = 0u32;

        loop {
            self.check_cancelled()?;

            let (value, err) = match op().await {
                Ok(value) => (Some(value), None),
                Err(err) => (None, Some(err)),
            };
            count += 1;

            let t = Try::new(count, start, err);
            let verdict = self.arbiter.arbitrate(&t);
            if let Some(notify) = &self.notify {
                notify(&t, verdict);
            }

            match verdict {
                Verdict::Done => {
                    return match value {
                        Some(value) => Ok(value),
                        None => Err(t.into_error()),
                    };
                }
                Verdict::Abort(AbortCause::Terminal) => return Err(t.into_error()),
                Verdict::Abort(AbortCause::Timeout(limit)) => {
                    return Err(Error::timeout_after(limit, t.err));
                }
                Verdict::Abort(AbortCause::MaxAttempts(limit)) => {
                    return Err(Error::limit_reached(limit, t.err));
                }
                Verdict::Retry => {
                    let wait = self.delay.delay(&t);
                    if let Some(err) = &t.err {
                        debug!("Attempt {} failed, retrying in {:?}: {}", t.count, wait, err);
                    }
                    Timer::after(wait).await;
                }
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.task {
            Some(task) => task.check_cancelled(),
            None => Ok(()),
        }
    }
}

/// Run `op` under `arbiter`, waiting according to `delay`
pub async fn execute<T, F, Fut>(
    op: F,
    arbiter: impl Arbiter + 'static,
    delay: impl Delay + 'static,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Action::new(arbiter).delay(delay).run(op).await
}

/// Retry `op` while it fails, every `delay`, for at most `timeout`
pub async fn while_unsuccessful<T, F, Fut>(op: F, delay: Duration, timeout: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Action::while_unsuccessful(delay, timeout).run(op).await
}

/// Retry `op` while it fails with return code 255, every `delay`, for at most `timeout`
pub async fn while_unsuccessful_where_retcode255<T, F, Fut>(
    op: F,
    delay: Duration,
    timeout: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Action::while_unsuccessful_where_retcode255(delay, timeout)
        .run(op)
        .await
}

/// Repeat `op` while it succeeds, every `delay`, for at most `timeout`
///
/// Returns `Ok` once `op` fails with a non terminal error.
pub async fn while_successful<T, F, Fut>(mut op: F, delay: Duration, timeout: Duration) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Action::while_unsuccessful(delay, timeout)
        .run(|| {
            let attempt = op();
            async move {
                match attempt.await {
                    Ok(_) => Err(Error::not_available("condition still satisfied")),
                    Err(err) if err.is_terminal() => Err(err),
                    Err(_) => Ok(()),
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::new_task;
    use crate::scerr::ErrorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: Duration = Duration::from_millis(1);

    #[smol_potat::test]
    async fn test_max_three_aborts_after_third_failure() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = execute(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::provider("quota exceeded"))
            },
            Max(3),
            Constant(FAST),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert_eq!(err.cause().unwrap().message(), "quota exceeded");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[smol_potat::test]
    async fn test_timeout_abort_has_distinct_kind() {
        let result: Result<()> = Action::while_unsuccessful(FAST, Duration::from_millis(20))
            .run(|| async { Err(Error::not_available("host not ready")) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.cause().unwrap().kind(), ErrorKind::NotAvailable);
    }

    #[smol_potat::test]
    async fn test_succeeds_after_failures() {
        let calls = &AtomicU32::new(0);
        let value = while_unsuccessful(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::not_available("not yet"))
                } else {
                    Ok(42)
                }
            },
            FAST,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[smol_potat::test]
    async fn test_terminal_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = Action::with_default_arbiter()
            .delay(Constant(FAST))
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::aborted("stop requested"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[smol_potat::test]
    async fn test_retcode255_only() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = while_unsuccessful_where_retcode255(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::execution("ssh not ready", 255))
                } else {
                    Err(Error::execution("command failed", 2))
                }
            },
            FAST,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(result.unwrap_err().retcode(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[smol_potat::test]
    async fn test_while_successful() {
        let calls = &AtomicU32::new(0);
        while_successful(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Ok(())
                } else {
                    Err(Error::not_found("host gone"))
                }
            },
            FAST,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[smol_potat::test]
    async fn test_notify_sees_every_attempt() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let _: Result<()> = Action::new(Max(4))
            .delay(Constant(FAST))
            .notify(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .run(|| async { Err(Error::provider("boom")) })
            .await;
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[smol_potat::test]
    async fn test_cancellation_stops_loop() {
        let (task, cancel) = new_task(None);
        let calls = &AtomicU32::new(0);
        let result: Result<()> = Action::while_unsuccessful(FAST, Duration::from_secs(60))
            .within(&task)
            .run(|| {
                if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                    cancel.cancel();
                }
                async { Err(Error::not_available("never ready")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
