//! Lifecycle acceptance tests.
//!
//! Exercise start/stop, deferred execution, and failure isolation with the
//! default thread-backed timer.
//!
//! # Acceptance Criteria
//!
//! - A started driver ticks without any host involvement
//! - `stop()` halts ticking, `start()` resumes without losing state
//! - Deferred callbacks fire exactly once and leave the registry
//! - A failing callback never stops the driver

use super::common::{init_tracing, wait_for, Counter};
use std::thread;
use std::time::Duration;
use tick_common::state::RunState;
use tick_common::TickError;
use tick_runtime::TickDriver;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_driver_ticks_on_its_own() {
    init_tracing();
    let driver = TickDriver::new(200).unwrap();
    let counter = Counter::new();
    driver.on_tick(counter.callback());

    assert!(driver.is_running());
    assert!(wait_for(WAIT, || counter.get() >= 10), "driver never ticked");
    assert!(driver.total_ticks() >= 10);
    assert!(driver.current_tick() < 200);
}

#[test]
fn test_stop_halts_and_start_resumes() {
    init_tracing();
    let driver = TickDriver::new(200).unwrap();
    let counter = Counter::new();
    driver.on_tick(counter.callback());
    assert!(wait_for(WAIT, || counter.get() >= 5));

    driver.stop();
    assert_eq!(driver.state(), RunState::Stopped);
    let ticks_at_stop = driver.total_ticks();
    let count_at_stop = counter.get();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(driver.total_ticks(), ticks_at_stop);
    assert_eq!(counter.get(), count_at_stop);

    driver.start().unwrap();
    assert_eq!(driver.callback_count(), 1);
    assert!(wait_for(WAIT, || driver.total_ticks() > ticks_at_stop));
    assert!(counter.get() > count_at_stop);
}

#[test]
fn test_repeated_start_stop_cycles() {
    init_tracing();
    let driver = TickDriver::new(500).unwrap();
    for _ in 0..20 {
        driver.start().unwrap();
        driver.start().unwrap();
        driver.stop();
        driver.stop();
    }
    assert!(!driver.is_running());

    let ticks = driver.total_ticks();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(driver.total_ticks(), ticks);
}

#[test]
fn test_deferred_callbacks_fire_once() {
    init_tracing();
    let driver = TickDriver::new(100).unwrap();
    let by_ticks = Counter::new();
    let by_seconds = Counter::new();

    let tick_handle = driver.schedule_after_ticks(5, by_ticks.once());
    let second_handle = driver
        .schedule_after_seconds(0.05, by_seconds.once())
        .unwrap();

    assert!(wait_for(WAIT, || by_ticks.get() == 1 && by_seconds.get() == 1));
    assert!(!driver.is_registered(&tick_handle));
    assert!(!driver.is_registered(&second_handle));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(by_ticks.get(), 1);
    assert_eq!(by_seconds.get(), 1);
}

#[test]
fn test_failing_callback_does_not_stop_driver() {
    init_tracing();
    let driver = TickDriver::new(200).unwrap();
    driver.on_tick(|| anyhow::bail!("always fails"));
    driver.on_tick(|| panic!("always panics"));
    let healthy = Counter::new();
    driver.on_tick(healthy.callback());

    assert!(wait_for(WAIT, || healthy.get() >= 10));
    assert!(driver.is_running());
}

#[test]
fn test_stop_from_callback_on_timer_thread() {
    init_tracing();
    let driver = TickDriver::new(200).unwrap();
    let weak = driver.downgrade();
    let counter = Counter::new();
    let mut count = counter.callback();
    driver.on_tick(move || {
        count()?;
        if let Some(driver) = weak.upgrade() {
            driver.stop();
        }
        Ok(())
    });

    assert!(wait_for(WAIT, || !driver.is_running()));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(counter.get(), 1);
    assert_eq!(driver.total_ticks(), 1);
}

#[test]
fn test_dropping_driver_stops_ticking() {
    init_tracing();
    let counter = Counter::new();
    {
        let driver = TickDriver::new(200).unwrap();
        driver.on_tick(counter.callback());
        assert!(wait_for(WAIT, || counter.get() >= 3));
    }
    let after_drop = counter.get();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(counter.get(), after_drop);
}

#[test]
fn test_zero_rate_rejected() {
    assert_eq!(TickDriver::new(0).unwrap_err(), TickError::InvalidTickRate(0));
}
