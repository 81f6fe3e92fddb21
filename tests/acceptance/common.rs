//! Common utilities for integration tests.
//!
//! Provides helpers for:
//! - Installing a test log subscriber once per process
//! - Counting callback invocations across threads
//! - Polling for conditions with a timeout

#![allow(dead_code)] // Not every helper is used by every test module

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

static INIT_TRACING: Once = Once::new();

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; defaults to warnings from the tick crates.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tick_runtime=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}

/// Thread-safe invocation counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    count: Arc<AtomicUsize>,
}

impl Counter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Closure that increments this counter on every call.
    pub fn callback(&self) -> impl FnMut() -> anyhow::Result<()> + Send + 'static {
        let count = Arc::clone(&self.count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// One-shot closure that increments this counter.
    pub fn once(&self) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static {
        let count = Arc::clone(&self.count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
///
/// Returns whether the condition was met.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
