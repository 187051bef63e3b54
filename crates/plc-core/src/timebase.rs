use std::time::{Duration, Instant, SystemTime};

/// Stopwatch for the tick loop: each `lap` returns the time since the
/// previous lap and restarts the count.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    started: Instant,
    last_lap: Instant,
}

impl TickClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_lap: now,
        }
    }

    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_lap);
        self.last_lap = now;
        dt
    }

    /// Monotonic time since the clock was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wall-clock time for timestamps handed to collaborators.
    pub fn wall(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
