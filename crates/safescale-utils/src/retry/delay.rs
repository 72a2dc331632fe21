//! Delay policies between two attempts

use super::Try;
use std::time::Duration;

/// Computes how long to wait before the next attempt
pub trait Delay: Send + Sync {
    /// Delay to observe after attempt `t`
    fn delay(&self, t: &Try) -> Duration;
}

/// Same delay between every attempt
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub Duration);

impl Delay for Constant {
    fn delay(&self, _t: &Try) -> Duration {
        self.0
    }
}

/// Delay growing by `step` with each attempt
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    /// Delay after the first attempt
    pub base: Duration,
    /// Added after each further attempt
    pub step: Duration,
}

impl Delay for Linear {
    fn delay(&self, t: &Try) -> Duration {
        self.base + self.step * t.count.saturating_sub(1)
    }
}

/// Delay doubling with each attempt, never above `cap`
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    /// Delay after the first attempt
    pub base: Duration,
    /// Upper bound
    pub cap: Duration,
}

impl Delay for Exponential {
    fn delay(&self, t: &Try) -> Duration {
        let shift = t.count.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << shift)
            .map_or(self.cap, |d| d.min(self.cap))
    }
}
