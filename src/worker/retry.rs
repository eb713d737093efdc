//! # Retry Policy
//!
//! Exponential backoff applied by the consumer when a job fails.
//!
//! The delay after the `n`th failed attempt is
//! `initial_backoff × multiplier^(n-1)`, capped at `max_backoff`. Because the
//! delay is derived from the attempt number alone, redeliveries never drift.

use std::time::Duration;

use crate::config::RetryConfig;

/// What the consumer does with a failed delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Release the job back to the queue, visible again after the delay
    Retry(Duration),
    /// Move the job to the dead-letter store
    DeadLetter(DeadLetterCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterCause {
    AttemptsExhausted,
    NonRetryable,
}

impl DeadLetterCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterCause::AttemptsExhausted => "attempts_exhausted",
            DeadLetterCause::NonRetryable => "non_retryable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Backoff after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= self.max_backoff.as_millis() as f64 {
            self.max_backoff
        } else {
            Duration::from_millis(delay_ms.round() as u64)
        }
    }

    /// Decide the fate of a delivery that failed on `attempt` (1-based)
    pub fn decide(&self, attempt: u32, retryable: bool) -> RetryDecision {
        if !retryable {
            RetryDecision::DeadLetter(DeadLetterCause::NonRetryable)
        } else if attempt >= self.max_attempts {
            RetryDecision::DeadLetter(DeadLetterCause::AttemptsExhausted)
        } else {
            RetryDecision::Retry(self.delay_for_attempt(attempt))
        }
    }
}
