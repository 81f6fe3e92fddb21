//! Periodic triggers that drive the tick loop.
//!
//! A trigger is armed with [`IntervalTimer::every`] and stays armed for as
//! long as the returned [`IntervalGuard`] lives. Dropping or cancelling the
//! guard guarantees that no further firing starts; a firing already in
//! progress is allowed to complete.
//!
//! - [`ThreadTimer`]: one dedicated thread per armed interval, sleeping to
//!   absolute deadlines.
//! - [`ManualTimer`]: fires only when told to, for tests and hosts that own
//!   their own event loop.

use crossbeam_utils::sync::Parker;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tick_common::error::{TickError, TickResult};
use tracing::{debug, error, warn};

/// Work performed on every firing.
pub type FireFn = Box<dyn FnMut() + Send + 'static>;

/// Host-provided periodic trigger.
pub trait IntervalTimer: Send + Sync + fmt::Debug {
    /// Invoke `fire` every `period` until the returned guard is released.
    ///
    /// Firings never overlap.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Timer`] if the trigger cannot be armed.
    fn every(&self, period: Duration, fire: FireFn) -> TickResult<IntervalGuard>;
}

/// Ownership of an armed trigger. Released on [`cancel`](Self::cancel) or drop.
#[must_use = "dropping the guard cancels the interval"]
pub struct IntervalGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl IntervalGuard {
    /// Wrap the action that disarms a trigger.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Disarm the trigger now.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for IntervalGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for IntervalGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalGuard")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Interval timer running each armed interval on its own thread.
#[derive(Debug, Clone)]
pub struct ThreadTimer {
    thread_name: String,
}

impl ThreadTimer {
    /// Create a timer whose threads carry the default name.
    #[must_use]
    pub fn new() -> Self {
        Self::named("tick-driver")
    }

    /// Create a timer whose threads carry `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            thread_name: name.into(),
        }
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalTimer for ThreadTimer {
    fn every(&self, period: Duration, mut fire: FireFn) -> TickResult<IntervalGuard> {
        if period.is_zero() {
            return Err(TickError::Timer("interval period must be non-zero".into()));
        }

        let stop_requested = Arc::new(AtomicBool::new(false));
        let parker = Parker::new();
        let unparker = parker.unparker().clone();

        let stop = Arc::clone(&stop_requested);
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                debug!(period_us = period.as_micros(), "Interval thread started");
                let mut deadline = Instant::now() + period;

                'firing: loop {
                    // Sleep to the absolute deadline; cancellation unparks early.
                    loop {
                        if stop.load(Ordering::Acquire) {
                            break 'firing;
                        }
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        parker.park_timeout(deadline - now);
                    }

                    fire();

                    deadline += period;
                    let now = Instant::now();
                    if now > deadline {
                        let behind = now - deadline;
                        if behind > period {
                            warn!(
                                behind_us = behind.as_micros(),
                                period_us = period.as_micros(),
                                "Interval fell behind, skipping missed firings"
                            );
                        }
                        deadline = now + period;
                    }
                }

                debug!("Interval thread stopped");
            })
            .map_err(|e| {
                error!("Failed to spawn interval thread: {e}");
                TickError::Timer(format!("failed to spawn interval thread: {e}"))
            })?;

        Ok(IntervalGuard::new(move || {
            stop_requested.store(true, Ordering::Release);
            unparker.unpark();

            // Cancelling from inside a firing: the loop exits once it returns.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = handle.join() {
                warn!("Interval thread panicked: {:?}", e);
            }
        }))
    }
}

#[derive(Default)]
struct ManualState {
    fire: Option<FireFn>,
    period: Option<Duration>,
    generation: u64,
    armed_count: u64,
}

/// Timer that fires only on [`ManualTimer::fire`].
///
/// Clones share state, so a test can keep one clone and hand another to
/// the driver.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTimer {
    /// Create an unarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Period of the currently armed interval.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.lock().period
    }

    /// Whether an interval is currently armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.lock().period.is_some()
    }

    /// Number of times an interval has been armed.
    #[must_use]
    pub fn armed_count(&self) -> u64 {
        self.lock().armed_count
    }

    /// Fire the armed interval once. Returns false if nothing is armed.
    pub fn fire(&self) -> bool {
        let (mut fire, generation) = {
            let mut state = self.lock();
            match state.fire.take() {
                Some(fire) => (fire, state.generation),
                None => return false,
            }
        };

        // Lock released so the firing may cancel or re-arm this timer.
        fire();

        let mut state = self.lock();
        if state.generation == generation && state.period.is_some() {
            state.fire = Some(fire);
        }
        true
    }

    /// Fire `n` times, stopping early if the interval is cancelled.
    pub fn fire_n(&self, n: usize) -> usize {
        (0..n).take_while(|_| self.fire()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualTimer")
            .field("period", &state.period)
            .field("armed_count", &state.armed_count)
            .finish()
    }
}

impl IntervalTimer for ManualTimer {
    fn every(&self, period: Duration, fire: FireFn) -> TickResult<IntervalGuard> {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.armed_count += 1;
            state.period = Some(period);
            state.fire = Some(fire);
            state.generation
        };

        let shared = Arc::clone(&self.state);
        Ok(IntervalGuard::new(move || {
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if state.generation == generation {
                state.fire = None;
                state.period = None;
            }
        }))
    }
}
