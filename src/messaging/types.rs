//! # Messaging Types
//!
//! Core types for the provider-agnostic queue abstraction.

use std::time::Duration;

/// Unique identifier for a queued message, assigned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Handle for acknowledging, releasing or dead-lettering a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    /// Create a new receipt handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// A message received from a queue with delivery metadata
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    /// Provider-assigned message id
    pub message_id: MessageId,

    /// Handle for acknowledging this delivery
    pub receipt_handle: ReceiptHandle,

    /// The message payload
    pub message: T,

    /// Number of times this message has been delivered, including this one
    pub receive_count: u32,

    /// When the message was originally enqueued
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl<T> QueuedMessage<T> {
    /// Create a new queued message
    pub fn new(
        message_id: MessageId,
        receipt_handle: ReceiptHandle,
        message: T,
        receive_count: u32,
        enqueued_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            message_id,
            receipt_handle,
            message,
            receive_count,
            enqueued_at,
        }
    }

    /// Map the payload to a different type, keeping delivery metadata
    pub fn map<U, F>(self, f: F) -> QueuedMessage<U>
    where
        F: FnOnce(T) -> U,
    {
        QueuedMessage {
            message_id: self.message_id,
            receipt_handle: self.receipt_handle,
            message: f(self.message),
            receive_count: self.receive_count,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// Queue statistics for monitoring
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Queue name
    pub queue_name: String,

    /// Messages in the queue (visible + in flight)
    pub message_count: u64,

    /// Messages currently leased to a consumer
    pub in_flight_count: u64,

    /// Messages moved to the dead-letter store
    pub dead_letter_count: u64,

    /// Age of the oldest message still in the queue
    pub oldest_message_age: Option<Duration>,

    pub total_sent: u64,
    pub total_received: u64,
    pub total_acked: u64,
    pub total_released: u64,
}

impl QueueStats {
    /// Create new queue stats
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            in_flight_count: 0,
            dead_letter_count: 0,
            oldest_message_age: None,
            total_sent: 0,
            total_received: 0,
            total_acked: 0,
            total_released: 0,
        }
    }
}

/// Result of verifying that a set of queues exists
#[derive(Debug, Clone, Default)]
pub struct QueueHealthReport {
    pub healthy: Vec<String>,
    pub missing: Vec<String>,
}

impl QueueHealthReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_healthy(&mut self, queue_name: impl Into<String>) {
        self.healthy.push(queue_name.into());
    }

    pub fn add_missing(&mut self, queue_name: impl Into<String>) {
        self.missing.push(queue_name.into());
    }

    pub fn is_healthy(&self) -> bool {
        self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_message_map_keeps_metadata() {
        let now = chrono::Utc::now();
        let msg = QueuedMessage::new(
            MessageId::from(7u64),
            ReceiptHandle::from(7u64),
            b"{}".to_vec(),
            2,
            now,
        );

        let mapped = msg.map(|bytes| bytes.len());
        assert_eq!(mapped.message, 2);
        assert_eq!(mapped.receive_count, 2);
        assert_eq!(mapped.message_id.as_str(), "7");
        assert_eq!(mapped.enqueued_at, now);
    }

    #[test]
    fn test_health_report() {
        let mut report = QueueHealthReport::new();
        report.add_healthy("tasks");
        assert!(report.is_healthy());

        report.add_missing("processors");
        assert!(!report.is_healthy());
        assert_eq!(report.missing, vec!["processors".to_string()]);
    }
}
