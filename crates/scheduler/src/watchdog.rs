//! Loop timing - detects cycles that take longer than the loop period.

use std::time::{Duration, Instant};
use tracing::warn;

/// Measures the wall time of one scheduler cycle, split into named epochs.
#[derive(Debug)]
pub struct LoopWatchdog {
    period: Duration,
    enabled: bool,
    started: Option<Instant>,
    last_mark: Option<Instant>,
    epochs: Vec<(&'static str, Duration)>,
}

impl LoopWatchdog {
    /// Create a watchdog for the given loop period.
    pub fn new(period: Duration, enabled: bool) -> Self {
        Self {
            period,
            enabled,
            started: None,
            last_mark: None,
            epochs: Vec::new(),
        }
    }

    /// Begin timing a cycle.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.started = Some(now);
        self.last_mark = Some(now);
        self.epochs.clear();
    }

    /// Record the time spent since the previous mark under `name`.
    pub fn epoch(&mut self, name: &'static str) {
        let now = Instant::now();
        if let Some(last) = self.last_mark.replace(now) {
            self.epochs.push((name, now - last));
        }
    }

    /// Epochs recorded in the current cycle.
    pub fn epochs(&self) -> &[(&'static str, Duration)] {
        &self.epochs
    }

    /// Stop timing. Returns the cycle's duration if it overran the period.
    pub fn finish(&mut self, cycle: u64) -> Option<Duration> {
        let elapsed = self.started.take()?.elapsed();
        self.last_mark = None;
        if elapsed <= self.period {
            return None;
        }

        if self.enabled {
            let breakdown: Vec<String> = self
                .epochs
                .iter()
                .map(|(name, took)| format!("{}={:?}", name, took))
                .collect();
            warn!(
                "Scheduler loop overrun in cycle {}: {:?} > {:?} [{}]",
                cycle,
                elapsed,
                self.period,
                breakdown.join(", ")
            );
        }
        Some(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_overrun_within_period() {
        let mut watchdog = LoopWatchdog::new(Duration::from_secs(10), true);
        watchdog.start();
        watchdog.epoch("execute");
        assert_eq!(watchdog.epochs().len(), 1);
        assert!(watchdog.finish(1).is_none());
    }

    #[test]
    fn test_overrun_reported() {
        let mut watchdog = LoopWatchdog::new(Duration::ZERO, false);
        watchdog.start();
        std::thread::sleep(Duration::from_millis(2));
        watchdog.epoch("execute");

        let overrun = watchdog.finish(7).unwrap();
        assert!(overrun >= Duration::from_millis(2));
    }

    #[test]
    fn test_finish_without_start() {
        let mut watchdog = LoopWatchdog::new(Duration::ZERO, true);
        assert!(watchdog.finish(1).is_none());
    }
}
