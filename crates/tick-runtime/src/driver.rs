//! Fixed-rate tick driver.
//!
//! Every tick runs the same sequence:
//! 1. Snapshot the callback registry
//! 2. Run each snapshotted callback in registration order, isolating failures
//! 3. Advance the tick counter (wrapping at the tick rate)
//! 4. Derive latency and delta from the previous tick's timestamp
//! 5. Hand the timestamp to the performance monitor, if one is attached
//!
//! The registry lock is held only for the snapshot and the timing commit,
//! so callbacks are free to register, unregister, schedule, or stop.

use crate::callback::{next_callback_id, CallbackHandle};
use crate::clock::{Clock, MonotonicClock};
use crate::deferred::DeferredCallback;
use crate::monitor::{PerformanceMonitor, PerformanceReport};
use crate::timer::{IntervalGuard, IntervalTimer, ThreadTimer};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::{Duration, Instant};
use tick_common::config::TickConfig;
use tick_common::error::{CallbackId, TickError, TickResult};
use tick_common::rate::TickRate;
use tick_common::state::{RunState, StateMachine};
use tracing::{debug, info, trace, warn};

/// Result of a single [`TickDriver::tick`] call.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Another tick was already executing; nothing ran.
    pub skipped: bool,
    /// Tick index within the current second after this tick.
    pub current_tick: u32,
    /// Total ticks completed, including this one.
    pub total_ticks: u64,
    /// Number of callbacks invoked.
    pub executed: usize,
    /// Time since the previous tick.
    pub latency: Duration,
    /// Isolated callback failures, in execution order.
    pub failures: Vec<TickError>,
}

impl TickOutcome {
    fn skipped_tick() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Whether the tick ran and every callback succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }
}

/// Point-in-time view of a driver, for host-side reporting.
#[derive(Debug, Clone, Serialize)]
pub struct DriverSnapshot {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Lifecycle state.
    pub state: RunState,
    /// Tick index within the current second.
    pub current_tick: u32,
    /// Total ticks completed.
    pub total_ticks: u64,
    /// Time between the last two ticks, in milliseconds.
    pub tick_latency_ms: f64,
    /// Time between the last two ticks, in seconds.
    pub tick_delta: f64,
    /// Registered callbacks, counting duplicates.
    pub callbacks: usize,
    /// Performance report, if monitoring is enabled.
    pub performance: Option<PerformanceReport>,
}

struct DriverState {
    callbacks: Vec<CallbackHandle>,
    lifecycle: StateMachine,
    interval: Option<IntervalGuard>,
    current_tick: u32,
    total_ticks: u64,
    last_tick: Duration,
    tick_latency: Duration,
    monitor: Option<PerformanceMonitor>,
}

struct Shared {
    rate: TickRate,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn IntervalTimer>,
    slow_threshold: Duration,
    state: Mutex<DriverState>,
    /// Held for the whole of a tick so ticks never overlap.
    tick_gate: Mutex<()>,
}

/// Fixed-rate tick driver.
///
/// Cheap to clone; clones drive the same registry and timer. The periodic
/// trigger is cancelled when the last clone is dropped.
#[derive(Clone)]
pub struct TickDriver {
    shared: Arc<Shared>,
}

/// Non-owning reference to a [`TickDriver`].
#[derive(Clone)]
pub struct WeakTickDriver {
    shared: Weak<Shared>,
}

impl WeakTickDriver {
    /// Get the driver back if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<TickDriver> {
        self.shared.upgrade().map(|shared| TickDriver { shared })
    }
}

impl fmt::Debug for WeakTickDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTickDriver")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl TickDriver {
    /// Create a driver at `tick_rate` ticks per second and start it.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidTickRate`] if `tick_rate` is zero, or
    /// [`TickError::Timer`] if the tick thread cannot be started.
    pub fn new(tick_rate: u32) -> TickResult<Self> {
        TickDriverBuilder::new().tick_rate(tick_rate).build()
    }

    /// Create a driver at the default 64 ticks per second and start it.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Timer`] if the tick thread cannot be started.
    pub fn with_defaults() -> TickResult<Self> {
        TickDriverBuilder::new().build()
    }

    /// Create a driver from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Config`] if the configuration is invalid, or
    /// [`TickError::Timer`] if autostart fails.
    pub fn from_config(config: &TickConfig) -> TickResult<Self> {
        TickDriverBuilder::from_config(config)?.build()
    }

    /// Non-owning reference, for callbacks that need to reach their driver.
    #[must_use]
    pub fn downgrade(&self) -> WeakTickDriver {
        WeakTickDriver {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Append a callback to the registry.
    pub fn register(&self, callback: &CallbackHandle) {
        self.lock_state().callbacks.push(callback.clone());
        trace!(callback = %callback.id(), "Callback registered");
    }

    /// Wrap `f` in a handle, register it, and return the handle.
    pub fn on_tick<F>(&self, f: F) -> CallbackHandle
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let handle = CallbackHandle::new(f);
        self.register(&handle);
        handle
    }

    /// Remove the first registration of `callback`.
    ///
    /// Returns false if it was not registered.
    pub fn unregister(&self, callback: &CallbackHandle) -> bool {
        self.unregister_id(callback.id())
    }

    /// Remove the first registration with identity `id`.
    pub fn unregister_id(&self, id: CallbackId) -> bool {
        let mut state = self.lock_state();
        match state.callbacks.iter().position(|cb| cb.id() == id) {
            Some(index) => {
                state.callbacks.remove(index);
                trace!(callback = %id, "Callback unregistered");
                true
            }
            None => false,
        }
    }

    /// Run `action` once, after `ticks` ticks have passed.
    ///
    /// With `ticks == 0` it runs on the next tick. The returned handle can be
    /// unregistered to cancel the action before it runs.
    pub fn schedule_after_ticks<F>(&self, ticks: u64, action: F) -> CallbackHandle
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let id = next_callback_id();
        let deferred = DeferredCallback::new(id, ticks, Box::new(action), self.downgrade());
        let handle = CallbackHandle::with_id(id, deferred);
        self.register(&handle);
        debug!(callback = %id, ticks, "Deferred callback scheduled");
        handle
    }

    /// Run `action` once, after roughly `seconds` seconds.
    ///
    /// The delay is converted to the nearest whole number of ticks, with
    /// halves rounding up.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidDelay`] for negative or non-finite delays.
    pub fn schedule_after_seconds<F>(&self, seconds: f64, action: F) -> TickResult<CallbackHandle>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let ticks = self.shared.rate.ticks_for_seconds(seconds)?;
        Ok(self.schedule_after_ticks(ticks, action))
    }

    /// Start firing ticks. No-op if already running.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Timer`] if the periodic trigger cannot be armed.
    pub fn start(&self) -> TickResult<()> {
        let mut state = self.lock_state();
        if state.lifecycle.state().is_running() {
            debug!("Tick driver already running");
            return Ok(());
        }

        let period = self.shared.rate.interval();
        let weak = self.downgrade();
        let guard = self.shared.timer.every(
            period,
            Box::new(move || {
                if let Some(driver) = weak.upgrade() {
                    driver.tick();
                }
            }),
        )?;

        state.lifecycle.transition(RunState::Running)?;
        state.interval = Some(guard);

        info!(
            tick_rate = self.shared.rate.get(),
            interval_us = period.as_micros(),
            "Tick driver started"
        );
        Ok(())
    }

    /// Stop firing ticks. No-op if already stopped.
    ///
    /// A tick already in progress runs to completion.
    pub fn stop(&self) {
        let guard = {
            let mut state = self.lock_state();
            if !state.lifecycle.state().is_running() {
                debug!("Tick driver already stopped");
                return;
            }
            if let Err(e) = state.lifecycle.transition(RunState::Stopped) {
                warn!(error = %e, "Unexpected lifecycle state while stopping");
            }
            state.interval.take()
        };

        // Cancelled outside the lock: the tick thread may need it to finish.
        if let Some(guard) = guard {
            guard.cancel();
        }

        info!(total_ticks = self.total_ticks(), "Tick driver stopped");
    }

    /// Execute one tick.
    ///
    /// Called by the periodic trigger, but may also be called directly, for
    /// example to step a stopped driver deterministically. If another tick is
    /// executing, this returns a skipped outcome without doing anything.
    pub fn tick(&self) -> TickOutcome {
        let _gate = match self.shared.tick_gate.try_lock() {
            Ok(gate) => gate,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Tick already in progress, skipping");
                return TickOutcome::skipped_tick();
            }
        };

        // 1. Snapshot: changes made by callbacks apply from the next tick.
        let callbacks = self.lock_state().callbacks.clone();

        // 2. Run callbacks in order
        let mut failures = Vec::new();
        for callback in &callbacks {
            let started = Instant::now();
            if let Err(e) = callback.invoke() {
                warn!(callback = %callback.id(), error = %e, "Tick callback failed");
                failures.push(e);
            }

            let elapsed = started.elapsed();
            if !self.shared.slow_threshold.is_zero() && elapsed > self.shared.slow_threshold {
                warn!(
                    callback = %callback.id(),
                    elapsed_us = elapsed.as_micros(),
                    threshold_us = self.shared.slow_threshold.as_micros(),
                    "Slow tick callback"
                );
            }
        }

        let now = self.shared.clock.now();
        let mut state = self.lock_state();

        // 3. Advance the tick counter
        state.current_tick += 1;
        if state.current_tick >= self.shared.rate.get() {
            state.current_tick = 0;
        }
        state.total_ticks += 1;

        // 4. Timing
        state.tick_latency = now.saturating_sub(state.last_tick);
        state.last_tick = now;

        // 5. Monitor
        if let Some(monitor) = state.monitor.as_mut() {
            monitor.capture(now);
        }

        trace!(
            tick = state.total_ticks,
            latency_us = state.tick_latency.as_micros(),
            callbacks = callbacks.len(),
            "Tick complete"
        );

        TickOutcome {
            skipped: false,
            current_tick: state.current_tick,
            total_ticks: state.total_ticks,
            executed: callbacks.len(),
            latency: state.tick_latency,
            failures,
        }
    }

    /// Attach a fresh performance monitor, or detach the current one.
    ///
    /// Enabling always starts from an empty history, even if a monitor was
    /// already attached.
    pub fn enable_monitoring(&self, enabled: bool) {
        let mut state = self.lock_state();
        if enabled {
            state.monitor = Some(PerformanceMonitor::new(self.shared.rate));
            debug!("Performance monitor attached");
        } else if state.monitor.take().is_some() {
            debug!("Performance monitor detached");
        }
    }

    /// Whether a performance monitor is attached.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.lock_state().monitor.is_some()
    }

    /// Performance report, or `None` if monitoring is disabled.
    #[must_use]
    pub fn report(&self) -> Option<PerformanceReport> {
        self.lock_state().monitor.as_ref().map(PerformanceMonitor::report)
    }

    /// Run `f` against the attached monitor, if any.
    pub fn with_monitor<R>(&self, f: impl FnOnce(&PerformanceMonitor) -> R) -> Option<R> {
        self.lock_state().monitor.as_ref().map(f)
    }

    /// Ticks per second.
    #[must_use]
    pub fn tick_rate(&self) -> TickRate {
        self.shared.rate
    }

    /// Nominal interval between ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.shared.rate.interval()
    }

    /// Nominal interval between ticks in milliseconds.
    #[must_use]
    pub fn tick_interval_ms(&self) -> f64 {
        self.shared.rate.interval_ms()
    }

    /// Tick index within the current second, in `[0, tick_rate)`.
    #[must_use]
    pub fn current_tick(&self) -> u32 {
        self.lock_state().current_tick
    }

    /// Total ticks completed.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.lock_state().total_ticks
    }

    /// Time between the last two ticks.
    #[must_use]
    pub fn tick_latency(&self) -> Duration {
        self.lock_state().tick_latency
    }

    /// Time between the last two ticks in milliseconds.
    #[must_use]
    pub fn tick_latency_ms(&self) -> f64 {
        self.tick_latency().as_secs_f64() * 1000.0
    }

    /// Time between the last two ticks in seconds.
    #[must_use]
    pub fn tick_delta(&self) -> f64 {
        self.tick_latency().as_secs_f64()
    }

    /// Clock reading at the end of the last tick.
    #[must_use]
    pub fn last_tick(&self) -> Duration {
        self.lock_state().last_tick
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.lock_state().lifecycle.state()
    }

    /// Whether the periodic trigger is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Number of registered callbacks, counting duplicates.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.lock_state().callbacks.len()
    }

    /// Whether `callback` is registered at least once.
    #[must_use]
    pub fn is_registered(&self, callback: &CallbackHandle) -> bool {
        self.lock_state().callbacks.contains(callback)
    }

    /// Point-in-time view of the driver.
    #[must_use]
    pub fn snapshot(&self) -> DriverSnapshot {
        let state = self.lock_state();
        DriverSnapshot {
            tick_rate: self.shared.rate.get(),
            state: state.lifecycle.state(),
            current_tick: state.current_tick,
            total_ticks: state.total_ticks,
            tick_latency_ms: state.tick_latency.as_secs_f64() * 1000.0,
            tick_delta: state.tick_latency.as_secs_f64(),
            callbacks: state.callbacks.len(),
            performance: state.monitor.as_ref().map(PerformanceMonitor::report),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DriverState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TickDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("TickDriver")
            .field("tick_rate", &self.shared.rate.get())
            .field("state", &state.lifecycle.state())
            .field("current_tick", &state.current_tick)
            .field("callbacks", &state.callbacks.len())
            .field("monitoring", &state.monitor.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a tick driver.
#[derive(Debug)]
pub struct TickDriverBuilder {
    tick_rate: u32,
    clock: Option<Arc<dyn Clock>>,
    timer: Option<Arc<dyn IntervalTimer>>,
    monitoring: bool,
    autostart: bool,
    slow_threshold: Duration,
}

impl TickDriverBuilder {
    /// Create a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&TickConfig::default())
    }

    /// Create a builder from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Config`] if the configuration is invalid.
    pub fn from_config(config: &TickConfig) -> TickResult<Self> {
        config
            .validate()
            .map_err(|e| TickError::Config(e.to_string()))?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: &TickConfig) -> Self {
        Self {
            tick_rate: config.tick_rate,
            clock: None,
            timer: None,
            monitoring: config.monitoring.enabled,
            autostart: config.autostart,
            slow_threshold: config.callbacks.slow_threshold,
        }
    }

    /// Set ticks per second.
    #[must_use]
    pub fn tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Use `clock` for tick timestamps.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Use `timer` as the periodic trigger.
    #[must_use]
    pub fn timer(mut self, timer: impl IntervalTimer + 'static) -> Self {
        self.timer = Some(Arc::new(timer));
        self
    }

    /// Attach a performance monitor on build.
    #[must_use]
    pub fn monitoring(mut self, enabled: bool) -> Self {
        self.monitoring = enabled;
        self
    }

    /// Start the periodic trigger on build.
    #[must_use]
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Warn about callbacks running longer than `threshold`. Zero disables.
    #[must_use]
    pub fn slow_callback_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Build the driver, starting it if autostart is set.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidTickRate`] for a zero rate, or
    /// [`TickError::Timer`] if autostart fails.
    pub fn build(self) -> TickResult<TickDriver> {
        let rate = TickRate::new(self.tick_rate)?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let timer = self.timer.unwrap_or_else(|| Arc::new(ThreadTimer::new()));

        let state = DriverState {
            callbacks: Vec::new(),
            lifecycle: StateMachine::new(),
            interval: None,
            current_tick: 0,
            total_ticks: 0,
            last_tick: clock.now(),
            tick_latency: Duration::ZERO,
            monitor: self.monitoring.then(|| PerformanceMonitor::new(rate)),
        };

        let driver = TickDriver {
            shared: Arc::new(Shared {
                rate,
                clock,
                timer,
                slow_threshold: self.slow_threshold,
                state: Mutex::new(state),
                tick_gate: Mutex::new(()),
            }),
        };

        if self.autostart {
            driver.start()?;
        }
        Ok(driver)
    }
}

impl Default for TickDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
