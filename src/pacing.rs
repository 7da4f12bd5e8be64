//! Frame pacing: keep the loop near the target rate without a timer thread.

use std::time::Duration;

use crate::traits::FrameRate;

/// Computes how long to wait after each iteration.
///
/// The interval is `1000 / fps` milliseconds, truncated. Overruns are not
/// compensated in later iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    /// Create a pacer for the given rate.
    #[must_use]
    pub const fn new(rate: FrameRate) -> Self {
        Self {
            interval: Duration::from_millis(rate.interval_millis()),
        }
    }

    /// Target time between iterations.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the current interval after `elapsed` of work, or zero.
    #[must_use]
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}
