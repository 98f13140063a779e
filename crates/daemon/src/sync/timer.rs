// Reusable interval gate for the periodic loops.
//
// Loops poll on a short fixed cadence and consult the timer each tick;
// the timer never drives sleep granularity itself. This trades scheduling
// precision for responsiveness to shutdown.

use std::time::Duration;

use tokio::time::Instant;

/// Records when it was last reset and answers whether the configured
/// interval has passed since. `elapsed` is a pure query; `reset` re-arms.
#[derive(Debug, Clone)]
pub struct Timer {
    last_reset: Instant,
    interval: Duration,
}

impl Timer {
    pub fn new(interval: Duration) -> Self {
        Self { last_reset: Instant::now(), interval }
    }

    /// True once strictly more than the interval has passed since the
    /// last reset.
    pub fn elapsed(&self) -> bool {
        self.elapsed_at(Instant::now())
    }

    pub fn reset(&mut self) {
        self.last_reset = Instant::now();
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn elapsed_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_reset) > self.interval
    }
}
