//! Tick pacing and performance-report acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Observed tick rate over one second is within 10% of nominal
//! - Health percentages stay within 85-115% on an idle machine
//! - Reports become available after three ticks

use super::common::{init_tracing, wait_for, Counter};
use std::thread;
use std::time::{Duration, Instant};
use tick_runtime::{ManualClock, ManualTimer, PerformanceReport, TickDriver, TickDriverBuilder};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_report_becomes_available() {
    init_tracing();
    let driver = TickDriverBuilder::new()
        .tick_rate(100)
        .monitoring(true)
        .build()
        .unwrap();

    assert!(wait_for(WAIT, || driver.total_ticks() >= 3));
    let report = driver.report().expect("monitoring enabled");
    assert!(report.tick.is_some());
    assert!(report.second.is_some());
    assert!(report.interval.is_some());

    let json = serde_json::to_value(driver.snapshot()).unwrap();
    assert_eq!(json["tick_rate"], 100);
    assert!(json["performance"]["tick"].is_i64());
}

#[test]
fn test_simulated_lag_lowers_health() {
    init_tracing();
    let timer = ManualTimer::new();
    let clock = ManualClock::new();
    let driver = TickDriverBuilder::new()
        .tick_rate(64)
        .timer(timer.clone())
        .clock(clock.clone())
        .monitoring(true)
        .build()
        .unwrap();

    // One second on schedule.
    for _ in 0..64 {
        clock.advance(driver.tick_interval());
        timer.fire();
    }
    assert_eq!(
        driver.report(),
        Some(PerformanceReport {
            tick: Some(100),
            second: Some(100),
            interval: Some(100),
        })
    );

    // Then ticks start taking one and a half intervals.
    for _ in 0..63 {
        clock.advance(driver.tick_interval() * 3 / 2);
        timer.fire();
    }
    let report = driver.report().unwrap();
    assert_eq!(report.tick, Some(50));
    assert_eq!(report.second, Some(50));
    // 63 slow pairs and 63 on-schedule pairs: average ratio 1.25.
    assert_eq!(report.interval, Some(75));
}

#[test]
#[ignore = "Timing-sensitive; run on an idle machine"]
fn test_pacing_matches_nominal_rate() {
    init_tracing();
    let driver = TickDriver::new(50).unwrap();
    driver.enable_monitoring(true);
    let counter = Counter::new();
    driver.on_tick(counter.callback());

    let started = Instant::now();
    thread::sleep(Duration::from_secs(2));
    let elapsed = started.elapsed();
    driver.stop();

    #[allow(clippy::cast_precision_loss)]
    let observed_rate = counter.get() as f64 / elapsed.as_secs_f64();
    println!("Observed rate: {observed_rate:.1} Hz (nominal 50 Hz)");
    assert!(
        (45.0..=55.0).contains(&observed_rate),
        "observed {observed_rate:.1} Hz"
    );

    let report = driver.report().unwrap();
    println!("Performance: {report}");
    for value in [report.tick, report.second, report.interval] {
        let value = value.expect("enough samples");
        assert!((85..=115).contains(&value), "health {value}%");
    }
}

#[test]
#[ignore = "Timing-sensitive; run on an idle machine"]
fn test_slow_callback_shows_as_lag() {
    init_tracing();
    let driver = TickDriverBuilder::new()
        .tick_rate(50)
        .monitoring(true)
        .slow_callback_threshold(Duration::from_millis(5))
        .build()
        .unwrap();
    // 30ms of work per 20ms tick.
    driver.on_tick(|| {
        thread::sleep(Duration::from_millis(30));
        Ok(())
    });

    thread::sleep(Duration::from_secs(2));
    driver.stop();

    let report = driver.report().unwrap();
    println!("Performance under load: {report}");
    let second = report.second.expect("enough samples");
    assert!(second < 70, "expected visible lag, got {second}%");
}
