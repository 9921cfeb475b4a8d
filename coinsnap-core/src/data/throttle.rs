//! Post-call throttle for the market data API.
//!
//! Every call is followed by a fixed sleep of `60 / rate_limit_per_minute`
//! seconds, whether it succeeded or failed. Back-to-back calls can therefore
//! never exceed the configured rate, and a single call always takes at least
//! one interval.

use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    interval: Duration,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Throttle that allows at most `calls` calls per minute. Zero is treated as one.
    pub fn per_minute(calls: u32) -> Self {
        Self::new(Duration::from_secs_f64(60.0 / f64::from(calls.max(1))))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block the current thread for one interval.
    pub fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        debug!(interval = ?self.interval, "throttling after API call");
        std::thread::sleep(self.interval);
    }

    /// Run `call`, then wait one interval regardless of what it returned.
    pub fn after<T>(&self, call: impl FnOnce() -> T) -> T {
        let outcome = call();
        self.wait();
        outcome
    }
}
