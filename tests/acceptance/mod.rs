//! Integration tests for tick-system acceptance testing.
//!
//! These tests verify runtime behavior with real threads and clocks:
//! - Tick pacing and jitter reporting
//! - Lifecycle and deferred execution across threads
//! - Configuration-driven construction

mod common;
mod config_test;
mod lifecycle_test;
mod pacing_test;
