//! # Structured Logging Module
//!
//! Environment-aware structured logging plus the tracing conventions used by
//! every dispatch stage: each unit of work runs inside a `process` span tagged
//! with its resource (`Event.<name>`, `Processor.<name>`, `Task.<name>`).

use std::sync::OnceLock;

use chrono::Utc;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{ConfigManager, LoggingConfig};
use crate::constants::{Resource, WORKER_SERVICE_NAME};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging
///
/// `RUST_LOG` wins over the configured level, which wins over the
/// environment default. Safe to call more than once; an already installed
/// global subscriber is kept.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let level = config
            .level
            .clone()
            .unwrap_or_else(|| default_log_level(&environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Log level based on environment
fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Root span for one unit of work
pub fn job_span(resource: &Resource, attempt: u32) -> Span {
    tracing::info_span!(
        "process",
        service.name = WORKER_SERVICE_NAME,
        resource.name = %resource,
        attempt = attempt,
    )
}

/// Log a fatal condition: the affected component stops and is not restarted
/// by this process
pub fn log_fatal(component: &str, operation: &str, error: &str) {
    tracing::error!(
        fatal = true,
        component = %component,
        operation = %operation,
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "FATAL"
    );
}

/// Log a failed unit of work with its payload context
pub fn log_job_error(component: &str, operation: &str, error: &str, context: &serde_json::Value) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = %context,
        timestamp = %Utc::now().to_rfc3339(),
        "Job failed"
    );
}
