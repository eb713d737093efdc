#![allow(dead_code)]

pub mod flaky_service;
pub mod log_capture;
pub mod recorders;
pub mod strategies;

use std::time::Duration;

use dispatch_core::config::DispatchConfig;

/// Configuration tuned for fast tests: tight polling, no backoff
pub fn fast_config() -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.consumer.concurrency = 4;
    config.consumer.poll_interval_ms = 5;
    config.retry.max_attempts = 3;
    config.retry.initial_backoff_ms = 1;
    config.retry.backoff_multiplier = 1.0;
    config.retry.max_backoff_ms = 1;
    config
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
