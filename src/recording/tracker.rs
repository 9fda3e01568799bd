//! Elapsed recording time
//!
//! Elapsed seconds are derived from the clock, not by counting ticks, so a
//! late or skipped timer wakeup never loses time. While running the tracker
//! holds a session start instant; on every resume that instant is re-derived
//! as `now - recorded`, where `recorded` keeps full precision. Only the
//! reported value is floored to whole seconds, so pause/resume cycles neither
//! lose nor double-count time.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Result of a tracker tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerTick {
    pub elapsed_seconds: u64,
    /// True on exactly one tick per session: the one that reached the limit
    pub limit_reached: bool,
}

type LimitCallback = Box<dyn FnMut(u64) + Send>;

pub struct DurationTracker {
    recorded: Duration,
    session_start: Option<Instant>,
    limit: Option<u64>,
    limit_fired: bool,
    on_limit: Option<LimitCallback>,
}

impl DurationTracker {
    pub fn new() -> Self {
        Self {
            recorded: Duration::ZERO,
            session_start: None,
            limit: None,
            limit_fired: false,
            on_limit: None,
        }
    }

    /// Set the auto-stop limit in seconds
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Callback invoked once, on the tick that reaches the limit
    pub fn on_limit(mut self, callback: impl FnMut(u64) + Send + 'static) -> Self {
        self.on_limit = Some(Box::new(callback));
        self
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.recorded.as_secs()
    }

    /// Time recorded so far, including the sub-second remainder
    pub fn recorded(&self) -> Duration {
        self.recorded
    }

    /// Delay until elapsed next crosses a multiple of `period`
    pub fn until_next_boundary(&self, period: Duration) -> Duration {
        let period_nanos = period.as_nanos();
        if period_nanos == 0 {
            return period;
        }
        let into_period = (self.recorded.as_nanos() % period_nanos) as u64;
        period.saturating_sub(Duration::from_nanos(into_period))
    }

    pub fn is_running(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Start or resume from the current elapsed value
    pub fn start_at(&mut self, now: Instant) {
        if self.session_start.is_some() {
            return;
        }
        // Recorded time was measured on this clock, so it cannot predate it.
        self.session_start = Some(now.checked_sub(self.recorded).unwrap_or(now));
    }

    pub fn tick(&mut self) -> TrackerTick {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> TrackerTick {
        self.recompute(now);

        let limit_reached = match self.limit {
            Some(limit) if self.is_running() && !self.limit_fired => {
                self.elapsed_seconds() >= limit
            }
            _ => false,
        };
        if limit_reached {
            self.limit_fired = true;
            let elapsed = self.elapsed_seconds();
            if let Some(callback) = self.on_limit.as_mut() {
                callback(elapsed);
            }
        }

        TrackerTick {
            elapsed_seconds: self.elapsed_seconds(),
            limit_reached,
        }
    }

    pub fn pause(&mut self) -> u64 {
        self.pause_at(Instant::now())
    }

    /// Stop ticking and return the frozen elapsed value
    ///
    /// A pause at or past the limit consumes the limit edge: the recording
    /// is already stopped, and resuming must not trigger another auto-pause.
    pub fn pause_at(&mut self, now: Instant) -> u64 {
        self.recompute(now);
        self.session_start = None;
        if self.limit.is_some_and(|limit| self.elapsed_seconds() >= limit) {
            self.limit_fired = true;
        }
        self.elapsed_seconds()
    }

    /// Zero the counter, stop ticking and re-arm the limit
    pub fn reset(&mut self) {
        self.recorded = Duration::ZERO;
        self.session_start = None;
        self.limit_fired = false;
    }

    fn recompute(&mut self, now: Instant) {
        if let Some(start) = self.session_start {
            let recorded = now.saturating_duration_since(start);
            self.recorded = self.recorded.max(recorded);
        }
    }
}

impl Default for DurationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DurationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurationTracker")
            .field("recorded", &self.recorded)
            .field("running", &self.is_running())
            .field("limit", &self.limit)
            .field("limit_fired", &self.limit_fired)
            .finish()
    }
}
