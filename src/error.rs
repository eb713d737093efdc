//! # Dispatch Errors
//!
//! Crate-level error taxonomy. Every job-level failure is surfaced to the
//! queue consumer as a [`DispatchError`]; [`DispatchError::is_retryable`]
//! decides whether the job is retried or dead-lettered.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::constants::HandlerKind;
use crate::messaging::MessagingError;

/// Where a fan-out branch was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutRoute {
    /// Raw event to the websocket relay queue
    Relay,
    /// Processor job to the processor queue
    Processor,
}

impl fmt::Display for FanOutRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanOutRoute::Relay => f.write_str("relay"),
            FanOutRoute::Processor => f.write_str("processor"),
        }
    }
}

/// A single failed enqueue during fan-out
#[derive(Debug, Clone, PartialEq)]
pub struct BranchFailure {
    pub processor_name: String,
    pub route: FanOutRoute,
    pub error: MessagingError,
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.processor_name, self.route, self.error)
    }
}

fn join_failures(failures: &[BranchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum DispatchError {
    /// A queued job names a handler the registry does not know
    #[error("{kind} \"{name}\" is not registered. Check the registered name matches the handler name.")]
    UnregisteredHandler { kind: HandlerKind, name: String },

    /// One or more fan-out branches failed to enqueue
    #[error(
        "Failed to dispatch event \"{event_name}\" to {} of its branches: {}",
        .failures.len(),
        join_failures(.failures)
    )]
    FanOut {
        event_name: String,
        failures: Vec<BranchFailure>,
    },

    /// A processor or task raised; the original error is kept verbatim
    #[error(transparent)]
    Handler(anyhow::Error),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("Failed to start {stage} consumer on queue {queue_name}: {message}")]
    ConsumerStartup {
        stage: String,
        queue_name: String,
        message: String,
    },
}

impl DispatchError {
    /// Create an unregistered processor error
    pub fn unregistered_processor(name: impl Into<String>) -> Self {
        Self::UnregisteredHandler {
            kind: HandlerKind::Processor,
            name: name.into(),
        }
    }

    /// Create an unregistered task error
    pub fn unregistered_task(name: impl Into<String>) -> Self {
        Self::UnregisteredHandler {
            kind: HandlerKind::Task,
            name: name.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether redelivering the job could succeed
    ///
    /// Registry mismatches and undecodable payloads fail the same way on
    /// every attempt, so they go straight to the dead-letter store.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UnregisteredHandler { .. }
            | Self::Configuration(_)
            | Self::Config(_)
            | Self::ConsumerStartup { .. } => false,
            Self::Messaging(err) => !err.is_poison(),
            Self::FanOut { .. } | Self::Handler(_) => true,
        }
    }

    /// Processors whose enqueue failed, for a fan-out error
    pub fn failed_branches(&self) -> Vec<&str> {
        match self {
            Self::FanOut { failures, .. } => failures
                .iter()
                .map(|f| f.processor_name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
