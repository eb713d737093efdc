//! # Dispatch Configuration System
//!
//! Layered configuration for the dispatch worker. Values come from, in
//! increasing precedence:
//!
//! 1. Built-in defaults (every section is optional)
//! 2. `dispatch.toml` in the configuration directory
//! 3. `dispatch.<environment>.toml` in the configuration directory
//! 4. `DISPATCH_*` environment variables, `__` separating nested keys
//!    (e.g. `DISPATCH_RETRY__MAX_ATTEMPTS=5`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dispatch_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let concurrency = manager.config().consumer.concurrency;
//! let events_queue = &manager.config().queues.events;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::constants::queues;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Queue names for the four dispatch queues
    pub queues: QueueNamesConfig,

    /// Consumer loop settings shared by every stage
    pub consumer: ConsumerConfig,

    /// Retry and backoff applied to failed jobs
    pub retry: RetryConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueNamesConfig {
    pub events: String,
    pub processors: String,
    pub websockets: String,
    pub tasks: String,
}

impl Default for QueueNamesConfig {
    fn default() -> Self {
        Self {
            events: queues::EVENTS.to_string(),
            processors: queues::PROCESSORS.to_string(),
            websockets: queues::WEBSOCKETS.to_string(),
            tasks: queues::TASKS.to_string(),
        }
    }
}

impl QueueNamesConfig {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.events.clone(),
            self.processors.clone(),
            self.websockets.clone(),
            self.tasks.clone(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Jobs processed in parallel per queue
    pub concurrency: usize,
    /// Sleep between polls when a queue is empty
    pub poll_interval_ms: u64,
    /// Lease duration for a received job
    pub visibility_timeout_seconds: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval_ms: 250,
            visibility_timeout_seconds: 300,
        }
    }
}

impl ConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total delivery attempts before a job is dead-lettered
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to the environment default when unset
    pub level: Option<String>,
    /// Emit JSON records instead of human-readable lines
    pub json: bool,
}

impl DispatchConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.consumer.concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.concurrency",
                self.consumer.concurrency,
                "must be at least 1",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                self.retry.max_attempts,
                "must be at least 1",
            ));
        }

        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier,
                "must be a number >= 1.0",
            ));
        }

        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_backoff_ms",
                self.retry.max_backoff_ms,
                "must not be lower than retry.initial_backoff_ms",
            ));
        }

        let names = self.queues.all();
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigurationError::validation_error(
                "queue names must not be empty",
            ));
        }

        let distinct: HashSet<&String> = names.iter().collect();
        if distinct.len() != names.len() {
            return Err(ConfigurationError::validation_error(format!(
                "queue names must be distinct, got {names:?}"
            )));
        }

        Ok(())
    }
}
