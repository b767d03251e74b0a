#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Tracing setup and fast retry policies shared by the integration tests.

use handelingen::fetch::{RetryPolicy, RetryingFetcher};
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A policy with no politeness delay or backoff and a short timeout.
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        timeout_per_attempt: Duration::from_secs(2),
        ..RetryPolicy::default()
    }
    .without_delays()
}

pub fn fast_fetcher(max_retries: u32) -> RetryingFetcher {
    RetryingFetcher::new(fast_policy(max_retries)).expect("client builds")
}
