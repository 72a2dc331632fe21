//! Arbiters decide, after each attempt, whether to retry, stop or abort

use super::{AbortCause, Try, Verdict};
use std::time::Duration;

/// Decides the fate of a retry loop after an attempt
pub trait Arbiter: Send + Sync {
    /// Verdict for the given attempt
    fn arbitrate(&self, t: &Try) -> Verdict;
}

impl<F> Arbiter for F
where
    F: Fn(&Try) -> Verdict + Send + Sync,
{
    fn arbitrate(&self, t: &Try) -> Verdict {
        self(t)
    }
}

fn terminal(t: &Try) -> Option<Verdict> {
    match &t.err {
        Some(err) if err.is_terminal() => Some(Verdict::Abort(AbortCause::Terminal)),
        _ => None,
    }
}

/// Done as soon as one child votes Done, Retry otherwise; any Abort wins
pub struct PrevailDone {
    arbiters: Vec<Box<dyn Arbiter>>,
}

impl PrevailDone {
    /// Combine the given arbiters
    pub fn new(arbiters: Vec<Box<dyn Arbiter>>) -> Self {
        Self { arbiters }
    }
}

impl Arbiter for PrevailDone {
    fn arbitrate(&self, t: &Try) -> Verdict {
        let mut last = Verdict::Retry;
        for arbiter in &self.arbiters {
            match arbiter.arbitrate(t) {
                abort @ Verdict::Abort(_) => return abort,
                Verdict::Done => last = Verdict::Done,
                Verdict::Retry => {}
            }
        }
        last
    }
}

/// Retry as soon as one child votes Retry, Done otherwise; any Abort wins
pub struct PrevailRetry {
    arbiters: Vec<Box<dyn Arbiter>>,
}

impl PrevailRetry {
    /// Combine the given arbiters
    pub fn new(arbiters: Vec<Box<dyn Arbiter>>) -> Self {
        Self { arbiters }
    }
}

impl Arbiter for PrevailRetry {
    fn arbitrate(&self, t: &Try) -> Verdict {
        let mut last = Verdict::Done;
        for arbiter in &self.arbiters {
            match arbiter.arbitrate(t) {
                abort @ Verdict::Abort(_) => return abort,
                Verdict::Retry => last = Verdict::Retry,
                Verdict::Done => {}
            }
        }
        last
    }
}

/// Build a [`PrevailDone`] from arbiters of different types
#[macro_export]
macro_rules! prevail_done {
    ($($arbiter:expr),+ $(,)?) => {
        $crate::retry::PrevailDone::new(vec![$(Box::new($arbiter) as Box<dyn $crate::retry::Arbiter>),+])
    };
}

/// Build a [`PrevailRetry`] from arbiters of different types
#[macro_export]
macro_rules! prevail_retry {
    ($($arbiter:expr),+ $(,)?) => {
        $crate::retry::PrevailRetry::new(vec![$(Box::new($arbiter) as Box<dyn $crate::retry::Arbiter>),+])
    };
}

/// Retry while the attempt fails
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsuccessful;

impl Arbiter for Unsuccessful {
    fn arbitrate(&self, t: &Try) -> Verdict {
        if let Some(verdict) = terminal(t) {
            return verdict;
        }
        if t.err.is_some() {
            Verdict::Retry
        } else {
            Verdict::Done
        }
    }
}

/// Retry only while the attempt fails with return code 255 (SSH not ready)
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsuccessfulWhereRetcode255;

impl Arbiter for UnsuccessfulWhereRetcode255 {
    fn arbitrate(&self, t: &Try) -> Verdict {
        if let Some(verdict) = terminal(t) {
            return verdict;
        }
        match &t.err {
            Some(err) if err.retcode() == Some(255) => Verdict::Retry,
            _ => Verdict::Done,
        }
    }
}

/// Retry while the attempt succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct Successful;

impl Arbiter for Successful {
    fn arbitrate(&self, t: &Try) -> Verdict {
        if let Some(verdict) = terminal(t) {
            return verdict;
        }
        if t.err.is_none() {
            Verdict::Retry
        } else {
            Verdict::Done
        }
    }
}

/// Retry failures until `limit` has elapsed since the first attempt
#[derive(Debug, Clone, Copy)]
pub struct Timeout(pub Duration);

impl Arbiter for Timeout {
    fn arbitrate(&self, t: &Try) -> Verdict {
        if let Some(verdict) = terminal(t) {
            return verdict;
        }
        if t.err.is_none() {
            return Verdict::Done;
        }
        if t.elapsed() >= self.0 {
            Verdict::Abort(AbortCause::Timeout(self.0))
        } else {
            Verdict::Retry
        }
    }
}

/// Retry failures until `limit` attempts have been made
#[derive(Debug, Clone, Copy)]
pub struct Max(pub u32);

impl Arbiter for Max {
    fn arbitrate(&self, t: &Try) -> Verdict {
        if let Some(verdict) = terminal(t) {
            return verdict;
        }
        if t.err.is_none() {
            return Verdict::Done;
        }
        if t.count >= self.0 {
            Verdict::Abort(AbortCause::MaxAttempts(self.0))
        } else {
            Verdict::Retry
        }
    }
}

/// At most 10 attempts within `big_delay`
pub fn default_arbiter(big_delay: Duration) -> PrevailDone {
    prevail_done!(Max(10), Timeout(big_delay))
}
