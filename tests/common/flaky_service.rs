use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use dispatch_core::messaging::{
    InMemoryMessagingService, MessageId, MessagingError, MessagingService, ProcessorJob,
    QueueHealthReport, QueueMessage, QueueStats, QueuedMessage, ReceiptHandle,
};

/// In-memory service with switchable faults
///
/// Sends of processor jobs addressed to a "broken" processor fail, as do
/// all sends to, or creation of, a "broken" queue. Everything else is
/// delegated to the wrapped [`InMemoryMessagingService`].
#[derive(Debug, Default)]
pub struct FlakyMessagingService {
    inner: Arc<InMemoryMessagingService>,
    broken_processors: Mutex<HashSet<String>>,
    broken_queues: Mutex<HashSet<String>>,
}

impl FlakyMessagingService {
    pub fn new(inner: Arc<InMemoryMessagingService>) -> Self {
        Self {
            inner,
            broken_processors: Mutex::new(HashSet::new()),
            broken_queues: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryMessagingService> {
        &self.inner
    }

    pub fn break_processor(&self, processor_name: &str) {
        self.broken_processors.lock().insert(processor_name.to_string());
    }

    pub fn break_queue(&self, queue_name: &str) {
        self.broken_queues.lock().insert(queue_name.to_string());
    }

    pub fn heal(&self) {
        self.broken_processors.lock().clear();
        self.broken_queues.lock().clear();
    }

    fn check_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        if self.broken_queues.lock().contains(queue_name) {
            return Err(MessagingError::unavailable(format!(
                "queue {queue_name} is unreachable"
            )));
        }
        Ok(())
    }

    fn check_payload(&self, payload: &[u8]) -> Result<(), MessagingError> {
        if let Ok(job) = ProcessorJob::from_bytes(payload) {
            if self.broken_processors.lock().contains(&job.processor_name) {
                return Err(MessagingError::unavailable(format!(
                    "connection reset while enqueueing for {}",
                    job.processor_name
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingService for FlakyMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        self.check_queue(queue_name)?;
        self.inner.ensure_queue(queue_name).await
    }

    async fn verify_queues(
        &self,
        queue_names: &[String],
    ) -> Result<QueueHealthReport, MessagingError> {
        self.inner.verify_queues(queue_names).await
    }

    async fn send(&self, queue_name: &str, payload: Vec<u8>) -> Result<MessageId, MessagingError> {
        self.check_queue(queue_name)?;
        self.check_payload(&payload)?;
        self.inner.send(queue_name, payload).await
    }

    async fn receive(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<Vec<u8>>>, MessagingError> {
        self.inner
            .receive(queue_name, max_messages, visibility_timeout)
            .await
    }

    async fn ack(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        self.inner.ack(queue_name, receipt_handle).await
    }

    async fn release(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        delay: Duration,
    ) -> Result<(), MessagingError> {
        self.inner.release(queue_name, receipt_handle, delay).await
    }

    async fn dead_letter(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        reason: &str,
    ) -> Result<(), MessagingError> {
        self.inner
            .dead_letter(queue_name, receipt_handle, reason)
            .await
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        self.inner.queue_stats(queue_name).await
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        self.inner.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        "flaky_in_memory"
    }
}
