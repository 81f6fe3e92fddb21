//! Tick rate and the nominal interval derived from it.

use crate::error::{TickError, TickResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

/// Default ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 64;

/// Ticks per second, guaranteed positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TickRate(NonZeroU32);

impl TickRate {
    /// Validate a raw rate.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidTickRate`] when `rate` is zero.
    pub fn new(rate: u32) -> TickResult<Self> {
        NonZeroU32::new(rate)
            .map(Self)
            .ok_or(TickError::InvalidTickRate(rate))
    }

    /// Ticks per second.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Nominal tick interval in milliseconds (`1000 / rate`).
    #[must_use]
    pub fn interval_ms(self) -> f64 {
        1000.0 / f64::from(self.get())
    }

    /// Nominal tick interval in nanoseconds.
    #[must_use]
    pub fn interval_ns(self) -> f64 {
        1_000_000_000.0 / f64::from(self.get())
    }

    /// Nominal tick interval, rounded to whole nanoseconds.
    ///
    /// Never zero: rates above one tick per nanosecond are paced at 1 ns.
    #[must_use]
    pub fn interval(self) -> Duration {
        let rate = u64::from(self.get());
        Duration::from_nanos(((1_000_000_000 + rate / 2) / rate).max(1))
    }

    /// Number of ticks closest to `seconds` at this rate.
    ///
    /// Halves round away from zero.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidDelay`] for negative or non-finite input.
    pub fn ticks_for_seconds(self, seconds: f64) -> TickResult<u64> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(TickError::InvalidDelay(format!(
                "{seconds} seconds is not a non-negative finite delay"
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (seconds * f64::from(self.get())).round() as u64;
        Ok(ticks)
    }

    /// Capacity of the five-second performance window.
    #[must_use]
    pub fn window_capacity(self) -> usize {
        (self.get() as usize).saturating_mul(5)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self(NonZeroU32::new(DEFAULT_TICK_RATE).unwrap_or(NonZeroU32::MIN))
    }
}

impl TryFrom<u32> for TickRate {
    type Error = TickError;

    fn try_from(rate: u32) -> TickResult<Self> {
        Self::new(rate)
    }
}

impl From<TickRate> for u32 {
    fn from(rate: TickRate) -> Self {
        rate.get()
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.get())
    }
}
