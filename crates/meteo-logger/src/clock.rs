use std::time::{Duration, Instant};

use chrono::Utc;
use meteo_core::supervisor::Clock;

/// Monotonic time from [`Instant`], wall-clock time from the system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn unix_time(&self) -> i64 {
        Utc::now().timestamp()
    }
}
