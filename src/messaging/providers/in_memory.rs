//! # In-Memory Messaging Service
//!
//! Thread-safe in-memory queue implementation for tests and single-process
//! deployments.
//!
//! ## Features
//!
//! - **Visibility Timeout**: Messages become invisible after receive, re-visible after timeout
//! - **Per-Lease Receipts**: Each receive issues a new receipt; receipts of expired
//!   leases are rejected once the message has been received again
//! - **Delayed Release**: Failed deliveries return to the queue after a backoff delay
//! - **Dead Letters**: Dead-lettered messages are retained per queue for inspection
//! - **Thread-Safe**: Uses `parking_lot::RwLock`; no lock is held across an await point

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::messaging::traits::{MessagingService, QueueMessage};
use crate::messaging::types::{
    MessageId, QueueHealthReport, QueueStats, QueuedMessage, ReceiptHandle,
};
use crate::messaging::MessagingError;

/// In-memory message with visibility tracking
#[derive(Debug, Clone)]
struct InMemoryQueuedMessage {
    id: u64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// When the message becomes visible again (None = visible now)
    visible_at: Option<DateTime<Utc>>,
    receive_count: u32,
    /// Whether the delivery numbered `receive_count` may still settle the message
    leased: bool,
}

/// A message removed from its queue by `dead_letter`
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message_id: MessageId,
    pub payload: Vec<u8>,
    pub receive_count: u32,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Decode the payload as a typed message
    pub fn decode<T: QueueMessage>(&self) -> Result<T, MessagingError> {
        T::from_bytes(&self.payload)
    }
}

#[derive(Debug)]
struct InMemoryQueue {
    messages: VecDeque<InMemoryQueuedMessage>,
    dead_letters: Vec<DeadLetter>,
    next_id: u64,
    total_sent: u64,
    total_received: u64,
    total_acked: u64,
    total_released: u64,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            dead_letters: Vec::new(),
            next_id: 1,
            total_sent: 0,
            total_received: 0,
            total_acked: 0,
            total_released: 0,
        }
    }

    /// Locate the message leased under `receipt_handle`
    ///
    /// Receipts have the form `<message id>:<receive count>`, so only the
    /// holder of the latest lease can settle the message.
    fn position(&self, receipt_handle: &ReceiptHandle) -> Result<usize, MessagingError> {
        let invalid = || MessagingError::invalid_receipt_handle(receipt_handle.as_str());
        let (id, lease) = receipt_handle.as_str().split_once(':').ok_or_else(invalid)?;
        let message_id: u64 = id.parse().map_err(|_| invalid())?;
        let lease: u32 = lease.parse().map_err(|_| invalid())?;

        let pos = self
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| MessagingError::message_not_found(message_id.to_string()))?;

        let msg = &self.messages[pos];
        if msg.receive_count != lease || !msg.leased {
            return Err(MessagingError::lease_lost(message_id.to_string()));
        }
        Ok(pos)
    }
}

fn lease_receipt(msg: &InMemoryQueuedMessage) -> ReceiptHandle {
    ReceiptHandle::new(format!("{}:{}", msg.id, msg.receive_count))
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration, MessagingError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| MessagingError::internal(format!("Duration out of range: {e}")))
}

/// In-memory messaging service
///
/// # Example
///
/// ```rust
/// use dispatch_core::messaging::{InMemoryMessagingService, MessagingService};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = InMemoryMessagingService::new();
/// service.ensure_queue("tasks").await?;
///
/// service.send("tasks", br#"{"task_name":"SendEmail"}"#.to_vec()).await?;
///
/// let messages = service.receive("tasks", 10, Duration::from_secs(30)).await?;
/// assert_eq!(messages.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryMessagingService {
    queues: RwLock<HashMap<String, InMemoryQueue>>,
}

impl Default for InMemoryMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessagingService {
    /// Create a new in-memory messaging service
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Create with pre-initialized queues
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let queues = queue_names
            .iter()
            .map(|name| (name.to_string(), InMemoryQueue::new()))
            .collect();
        Self {
            queues: RwLock::new(queues),
        }
    }

    /// Number of messages in a queue, visible or leased
    pub fn queue_length(&self, queue_name: &str) -> usize {
        self.queues
            .read()
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Decode every message in a queue without leasing it
    pub fn peek<T: QueueMessage>(&self, queue_name: &str) -> Result<Vec<T>, MessagingError> {
        let queues = self.queues.read();
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        queue
            .messages
            .iter()
            .map(|m| T::from_bytes(&m.payload))
            .collect()
    }

    /// Dead-lettered messages of a queue
    pub fn dead_letters(&self, queue_name: &str) -> Vec<DeadLetter> {
        self.queues
            .read()
            .get(queue_name)
            .map(|q| q.dead_letters.clone())
            .unwrap_or_default()
    }

    /// Clear all messages from a queue
    pub fn clear_queue(&self, queue_name: &str) {
        if let Some(queue) = self.queues.write().get_mut(queue_name) {
            queue.messages.clear();
            queue.dead_letters.clear();
        }
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        self.queues
            .write()
            .entry(queue_name.to_string())
            .or_insert_with(InMemoryQueue::new);
        Ok(())
    }

    async fn verify_queues(
        &self,
        queue_names: &[String],
    ) -> Result<QueueHealthReport, MessagingError> {
        let queues = self.queues.read();
        let mut report = QueueHealthReport::new();

        for name in queue_names {
            if queues.contains_key(name) {
                report.add_healthy(name);
            } else {
                report.add_missing(name);
            }
        }

        Ok(report)
    }

    async fn send(&self, queue_name: &str, payload: Vec<u8>) -> Result<MessageId, MessagingError> {
        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let id = queue.next_id;
        queue.next_id += 1;
        queue.total_sent += 1;

        queue.messages.push_back(InMemoryQueuedMessage {
            id,
            payload,
            enqueued_at: Utc::now(),
            visible_at: None,
            receive_count: 0,
            leased: false,
        });

        Ok(MessageId::from(id))
    }

    async fn receive(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<Vec<u8>>>, MessagingError> {
        let now = Utc::now();
        let visible_until = now + to_chrono(visibility_timeout)?;

        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let mut received = Vec::new();
        for msg in queue.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }

            let is_visible = msg.visible_at.map(|vt| vt <= now).unwrap_or(true);
            if !is_visible {
                continue;
            }

            msg.visible_at = Some(visible_until);
            msg.receive_count += 1;
            msg.leased = true;

            received.push(QueuedMessage::new(
                MessageId::from(msg.id),
                lease_receipt(msg),
                msg.payload.clone(),
                msg.receive_count,
                msg.enqueued_at,
            ));
        }
        queue.total_received += received.len() as u64;

        Ok(received)
    }

    async fn ack(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let pos = queue.position(receipt_handle)?;
        queue.messages.remove(pos);
        queue.total_acked += 1;
        Ok(())
    }

    async fn release(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        delay: Duration,
    ) -> Result<(), MessagingError> {
        let visible_at = Utc::now() + to_chrono(delay)?;

        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let pos = queue.position(receipt_handle)?;
        let msg = &mut queue.messages[pos];
        msg.leased = false;
        msg.visible_at = if delay.is_zero() {
            None
        } else {
            Some(visible_at)
        };
        queue.total_released += 1;
        Ok(())
    }

    async fn dead_letter(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        reason: &str,
    ) -> Result<(), MessagingError> {
        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let pos = queue.position(receipt_handle)?;
        if let Some(msg) = queue.messages.remove(pos) {
            queue.dead_letters.push(DeadLetter {
                message_id: MessageId::from(msg.id),
                payload: msg.payload,
                receive_count: msg.receive_count,
                reason: reason.to_string(),
                dead_lettered_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        let queues = self.queues.read();
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        let in_flight_count = queue
            .messages
            .iter()
            .filter(|m| m.visible_at.map(|vt| vt > now).unwrap_or(false))
            .count() as u64;

        let mut stats = QueueStats::new(queue_name, queue.messages.len() as u64);
        stats.in_flight_count = in_flight_count;
        stats.dead_letter_count = queue.dead_letters.len() as u64;
        stats.oldest_message_age = queue
            .messages
            .iter()
            .map(|m| m.enqueued_at)
            .min()
            .and_then(|oldest| (now - oldest).to_std().ok());
        stats.total_sent = queue.total_sent;
        stats.total_received = queue.total_received;
        stats.total_acked = queue.total_acked;
        stats.total_released = queue.total_released;

        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestMessage {
        id: u32,
        content: String,
    }

    fn message(id: u32) -> Vec<u8> {
        TestMessage {
            id,
            content: format!("Message {id}"),
        }
        .to_bytes()
        .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_queue() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue("test_queue").await.unwrap();

        let report = service
            .verify_queues(&["test_queue".to_string(), "other".to_string()])
            .await
            .unwrap();
        assert_eq!(report.healthy, vec!["test_queue".to_string()]);
        assert_eq!(report.missing, vec!["other".to_string()]);
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);

        let msg_id = service.send("test_queue", message(1)).await.unwrap();
        assert_eq!(msg_id.as_str(), "1");

        let received = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].receive_count, 1);
        let decoded = TestMessage::from_bytes(&received[0].message).unwrap();
        assert_eq!(decoded.id, 1);
    }

    #[tokio::test]
    async fn test_visibility_timeout() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        let first = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // Leased message is invisible to a second consumer
        let second = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_expired_lease_is_redelivered() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        service
            .receive("test_queue", 1, Duration::ZERO)
            .await
            .unwrap();
        let again = service
            .receive("test_queue", 1, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(again.len(), 1);
        assert_eq!(again[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_ack_removes_message() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        let received = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        service
            .ack("test_queue", &received[0].receipt_handle)
            .await
            .unwrap();

        assert_eq!(service.queue_length("test_queue"), 0);
        let stats = service.queue_stats("test_queue").await.unwrap();
        assert_eq!(stats.total_acked, 1);
    }

    #[tokio::test]
    async fn test_release_without_delay_redelivers() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        let received = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        service
            .release("test_queue", &received[0].receipt_handle, Duration::ZERO)
            .await
            .unwrap();

        let again = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_release_with_delay_hides_message() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        let received = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        service
            .release("test_queue", &received[0].receipt_handle, Duration::from_secs(60))
            .await
            .unwrap();

        let again = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(service.queue_length("test_queue"), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_moves_message() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(9)).await.unwrap();

        let received = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        service
            .dead_letter("test_queue", &received[0].receipt_handle, "attempts exhausted")
            .await
            .unwrap();

        assert_eq!(service.queue_length("test_queue"), 0);
        let dead = service.dead_letters("test_queue");
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "attempts exhausted");
        assert_eq!(dead[0].decode::<TestMessage>().unwrap().id, 9);
    }

    #[tokio::test]
    async fn test_peek_does_not_lease() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();
        service.send("test_queue", message(2)).await.unwrap();

        let peeked: Vec<TestMessage> = service.peek("test_queue").unwrap();
        assert_eq!(peeked.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);

        let received = service
            .receive("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(received.len(), 2);
    }

    #[tokio::test]
    async fn test_queue_not_found() {
        let service = InMemoryMessagingService::new();
        let result = service.send("nonexistent", message(1)).await;
        assert!(matches!(result, Err(MessagingError::QueueNotFound { .. })));
    }

    #[tokio::test]
    async fn test_stale_receipt_cannot_settle_newer_lease() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        let expired = service
            .receive("test_queue", 1, Duration::ZERO)
            .await
            .unwrap();
        let current = service
            .receive("test_queue", 1, Duration::from_secs(300))
            .await
            .unwrap();
        assert_ne!(expired[0].receipt_handle, current[0].receipt_handle);

        let stale = &expired[0].receipt_handle;
        assert!(matches!(
            service.release("test_queue", stale, Duration::ZERO).await,
            Err(MessagingError::LeaseLost { .. })
        ));
        assert!(matches!(
            service.ack("test_queue", stale).await,
            Err(MessagingError::LeaseLost { .. })
        ));
        assert!(matches!(
            service.dead_letter("test_queue", stale, "late").await,
            Err(MessagingError::LeaseLost { .. })
        ));

        // still leased to the current holder
        let third = service
            .receive("test_queue", 1, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(third.is_empty());

        service
            .ack("test_queue", &current[0].receipt_handle)
            .await
            .unwrap();
        assert_eq!(service.queue_length("test_queue"), 0);
    }

    #[tokio::test]
    async fn test_released_receipt_is_spent() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        service.send("test_queue", message(1)).await.unwrap();

        let received = service
            .receive("test_queue", 1, Duration::from_secs(30))
            .await
            .unwrap();
        let receipt = &received[0].receipt_handle;
        service
            .release("test_queue", receipt, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            service.ack("test_queue", receipt).await,
            Err(MessagingError::LeaseLost { .. })
        ));
        assert_eq!(service.queue_length("test_queue"), 1);
    }

    #[tokio::test]
    async fn test_invalid_receipt_handle() {
        let service = InMemoryMessagingService::with_queues(&["test_queue"]);
        let result = service
            .ack("test_queue", &ReceiptHandle::new("not-a-number"))
            .await;
        assert!(matches!(
            result,
            Err(MessagingError::InvalidReceiptHandle { .. })
        ));
    }
}
