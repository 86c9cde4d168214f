//! Time sources.

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// Source of the current instant for TTL and cleanup-period checks.
pub trait TimeSource: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Monotonic system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A time source that only moves when told to.
#[derive(Debug)]
pub struct ManualTime {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualTime {
    /// Creates a manual time source frozen at the current instant.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Returns how far time has been advanced.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_time_advances() {
        let time = ManualTime::new();
        let start = time.now();
        assert_eq!(time.now(), start);

        time.advance(Duration::from_millis(1100));
        assert_eq!(time.now().duration_since(start), Duration::from_millis(1100));
        assert_eq!(time.elapsed(), Duration::from_millis(1100));
    }
}
