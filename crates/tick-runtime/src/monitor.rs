//! Rolling tick-spacing monitor.
//!
//! Keeps the timestamps of the last five seconds of ticks (newest first)
//! and rates how closely their spacing matches the nominal interval:
//!
//! ```text
//! health = floor(100 - (avg(observed / nominal) * 100 - 100))
//! ```
//!
//! 100 means on schedule, below 100 means ticks land late, above 100 means
//! they land early. The value is not clamped and goes negative once ticks
//! take more than twice the nominal interval.

use crate::driver::TickDriver;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tick_common::rate::TickRate;

/// Upper bound on samples reserved up front; the window grows past it on demand.
const PREALLOCATED_SAMPLES: usize = 1024;

/// Health percentages over the three standard windows.
///
/// `None` means not enough samples have been captured yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PerformanceReport {
    /// Spacing of the most recent tick.
    pub tick: Option<i64>,
    /// Spacing over the last second of ticks.
    pub second: Option<i64>,
    /// Spacing over the last five seconds of ticks.
    pub interval: Option<i64>,
}

impl PerformanceReport {
    /// Whether any window has a value.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.tick.is_some() || self.second.is_some() || self.interval.is_some()
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn pct(v: Option<i64>) -> String {
            v.map_or_else(|| "n/a".to_string(), |v| format!("{v}%"))
        }
        write!(
            f,
            "tick={} second={} interval={}",
            pct(self.tick),
            pct(self.second),
            pct(self.interval)
        )
    }
}

/// Rolling window of tick timestamps, newest first.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    rate: TickRate,
    samples: VecDeque<Duration>,
}

impl PerformanceMonitor {
    /// Create an empty monitor for ticks at `rate`.
    #[must_use]
    pub fn new(rate: TickRate) -> Self {
        Self {
            rate,
            samples: VecDeque::with_capacity(rate.window_capacity().min(PREALLOCATED_SAMPLES) + 1),
        }
    }

    /// Create an empty monitor bound to `driver`'s tick rate.
    #[must_use]
    pub fn for_driver(driver: &TickDriver) -> Self {
        Self::new(driver.tick_rate())
    }

    /// Tick rate the window is sized and rated against.
    #[must_use]
    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// Record the timestamp of a completed tick.
    pub fn capture(&mut self, timestamp: Duration) {
        self.samples.push_front(timestamp);
        if self.samples.len() > self.capacity() {
            self.samples.pop_back();
        }
    }

    /// Health over the last tick, second, and five seconds.
    #[must_use]
    pub fn report(&self) -> PerformanceReport {
        let rate = self.rate.get() as usize;
        PerformanceReport {
            tick: self.window_report(2),
            second: self.window_report(rate),
            interval: self.window_report(self.capacity()),
        }
    }

    /// Health over the newest `n` samples.
    ///
    /// Returns `None` while the window holds two samples or fewer, or when
    /// `n` covers fewer than two samples.
    #[must_use]
    pub fn window_report(&self, n: usize) -> Option<i64> {
        if self.samples.len() <= 2 {
            return None;
        }
        let size = n.min(self.samples.len());
        if size < 2 {
            return None;
        }

        let nominal_ns = self.rate.interval_ns();
        let pairs = size - 1;
        let total: f64 = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .take(pairs)
            .map(|(newer, older)| (as_ns(*newer) - as_ns(*older)) / nominal_ns)
            .sum();

        #[allow(clippy::cast_precision_loss)]
        let avg = total / pairs as f64;

        #[allow(clippy::cast_possible_truncation)]
        let health = (100.0 - (avg * 100.0 - 100.0)).floor() as i64;
        Some(health)
    }

    /// Maximum number of samples retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rate.window_capacity()
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples have been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples, newest first.
    pub fn samples(&self) -> impl Iterator<Item = Duration> + '_ {
        self.samples.iter().copied()
    }

    /// Discard all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_ns(d: Duration) -> f64 {
    d.as_nanos() as f64
}
