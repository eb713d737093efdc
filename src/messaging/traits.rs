//! # Messaging Service Traits
//!
//! Provider-agnostic contract for the durable queue backing the dispatch
//! pipeline.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MessageId, QueueHealthReport, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;

/// Durable queue operations
///
/// Implementations provide at-least-once delivery: a received message stays
/// leased to one consumer until it is acknowledged, released or dead-lettered,
/// or until its visibility timeout expires and it becomes deliverable again.
/// Payloads are opaque bytes; typed access goes through [`QueueMessage`].
///
/// The trait is object safe so stages can hold an `Arc<dyn MessagingService>`.
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Create a queue if it doesn't exist (idempotent)
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError>;

    /// Create several queues, stopping at the first failure
    async fn ensure_queues(&self, queue_names: &[String]) -> Result<(), MessagingError> {
        for queue_name in queue_names {
            self.ensure_queue(queue_name).await?;
        }
        Ok(())
    }

    /// Report which of the given queues exist
    async fn verify_queues(
        &self,
        queue_names: &[String],
    ) -> Result<QueueHealthReport, MessagingError>;

    /// Append a payload to a queue and return its id
    async fn send(&self, queue_name: &str, payload: Vec<u8>) -> Result<MessageId, MessagingError>;

    /// Lease up to `max_messages` visible messages for `visibility_timeout`
    ///
    /// Each delivery increments the message's receive count.
    async fn receive(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<Vec<u8>>>, MessagingError>;

    /// Acknowledge successful processing (delete message)
    async fn ack(&self, queue_name: &str, receipt_handle: &ReceiptHandle)
        -> Result<(), MessagingError>;

    /// Return a leased message to the queue, visible again after `delay`
    async fn release(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        delay: Duration,
    ) -> Result<(), MessagingError>;

    /// Remove a leased message from the queue and keep it for inspection
    async fn dead_letter(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        reason: &str,
    ) -> Result<(), MessagingError>;

    /// Message counts for monitoring
    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<bool, MessagingError>;

    /// Provider name for logging/metrics
    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract
///
/// Types implementing this trait can travel through a [`MessagingService`].
pub trait QueueMessage: Send + Sync + Clone + 'static {
    /// Serialize the message to bytes
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    /// Deserialize the message from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

/// JSON encoding for every serde-compatible type
impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}
