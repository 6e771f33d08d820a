//! Per-cycle context and monotonic clocks.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Snapshot handed to every lifecycle hook during one scheduler cycle.
///
/// `now` is sampled once per cycle, so every command sees the same time
/// within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleContext {
    /// Cycle number, starting at 1 for the first `run`
    pub cycle: u64,

    /// Monotonic time since the clock's origin
    pub now: Duration,
}

impl CycleContext {
    /// Create a context.
    pub fn new(cycle: u64, now: Duration) -> Self {
        Self { cycle, now }
    }

    /// Time elapsed since `since`, saturating at zero.
    pub fn elapsed_since(&self, since: Duration) -> Duration {
        self.now.saturating_sub(since)
    }
}

/// Source of monotonic time for the scheduler.
pub trait Clock {
    /// Current time since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock for simulation and tests.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        handle.advance(Duration::from_millis(20));
        handle.advance(Duration::from_millis(20));
        assert_eq!(clock.now(), Duration::from_millis(40));

        clock.set(Duration::from_secs(1));
        assert_eq!(handle.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_elapsed_since_saturates() {
        let ctx = CycleContext::new(1, Duration::from_millis(10));
        assert_eq!(ctx.elapsed_since(Duration::from_millis(4)), Duration::from_millis(6));
        assert_eq!(ctx.elapsed_since(Duration::from_millis(50)), Duration::ZERO);
    }
}
