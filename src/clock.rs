//! Millisecond timestamps for probe requests.
//!
//! Timestamps are epoch milliseconds captured once, advanced by a monotonic
//! instant. Wall-clock steps during a run therefore never produce negative
//! round trips, and paused Tokio time drives the clock in tests.

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    epoch_ms: i64,
}

impl Clock {
    /// Anchor the clock at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp_millis())
    }

    /// Anchor the clock at an explicit epoch millisecond value.
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            origin: Instant::now(),
            epoch_ms,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as i64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Local wall-clock stamp used in slow/lag log lines, e.g. `15 09:41:07`.
pub fn date_string() -> String {
    chrono::Local::now().format("%-d %H:%M:%S").to_string()
}
