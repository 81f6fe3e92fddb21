//! Configuration-driven construction tests.

use super::common::init_tracing;
use std::io::Write;
use std::time::Duration;
use tick_common::config::{ConfigError, TickConfig};
use tick_common::TickError;
use tick_runtime::{ManualTimer, TickDriver, TickDriverBuilder};

#[test]
fn test_driver_from_config_file() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
tick_rate = 25
autostart = false

[monitoring]
enabled = true

[callbacks]
slow_threshold = "2ms"
"#
    )
    .unwrap();

    let config = TickConfig::from_file(file.path()).unwrap();
    assert_eq!(config.callbacks.slow_threshold, Duration::from_millis(2));

    let driver = TickDriver::from_config(&config).unwrap();
    assert_eq!(driver.tick_rate().get(), 25);
    assert_eq!(driver.tick_interval(), Duration::from_millis(40));
    assert!(!driver.is_running());
    assert!(driver.is_monitoring());

    // A stopped driver can still be stepped by hand.
    for _ in 0..30 {
        driver.tick();
    }
    assert_eq!(driver.current_tick(), 5);
}

#[test]
fn test_builder_from_config_with_custom_timer() {
    let config = TickConfig {
        tick_rate: 8,
        ..Default::default()
    };
    let timer = ManualTimer::new();
    let driver = TickDriverBuilder::from_config(&config)
        .unwrap()
        .timer(timer.clone())
        .build()
        .unwrap();

    assert!(driver.is_running());
    assert_eq!(timer.period(), Some(Duration::from_millis(125)));
}

#[test]
fn test_invalid_config_rejected() {
    let err = TickConfig::from_toml("tick_rate = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let config = TickConfig {
        tick_rate: 0,
        ..Default::default()
    };
    assert!(matches!(
        TickDriver::from_config(&config),
        Err(TickError::Config(_))
    ));
}
