//! Typed handle over one named queue.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::messaging::{
    MessageId, MessagingError, MessagingService, QueueMessage, QueueStats, QueuedMessage,
    ReceiptHandle,
};

/// A received message whose payload could not be decoded
///
/// Kept with its delivery metadata so the consumer can dead-letter it.
#[derive(Debug)]
pub struct UndecodableMessage {
    pub delivery: QueuedMessage<Vec<u8>>,
    pub error: MessagingError,
}

/// Outcome of decoding one delivery
pub type Delivery<T> = Result<QueuedMessage<T>, UndecodableMessage>;

/// Binds a queue name to the message type it carries
///
/// Cloning is cheap; every clone talks to the same backing service.
pub struct DispatchQueue<T> {
    name: String,
    service: Arc<dyn MessagingService>,
    _message: PhantomData<fn() -> T>,
}

impl<T> Clone for DispatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            service: Arc::clone(&self.service),
            _message: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DispatchQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("name", &self.name)
            .field("provider", &self.service.provider_name())
            .finish()
    }
}

impl<T> DispatchQueue<T> {
    pub fn new(name: impl Into<String>, service: Arc<dyn MessagingService>) -> Self {
        Self {
            name: name.into(),
            service,
            _message: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &Arc<dyn MessagingService> {
        &self.service
    }
}

impl<T: QueueMessage> DispatchQueue<T> {
    /// Create the backing queue if missing
    pub async fn ensure(&self) -> Result<(), MessagingError> {
        self.service.ensure_queue(&self.name).await
    }

    /// Enqueue one message
    pub async fn add(&self, message: &T) -> Result<MessageId, MessagingError> {
        let payload = message.to_bytes()?;
        self.service.send(&self.name, payload).await
    }

    /// Lease up to `max_messages` and decode them
    ///
    /// Decoding failures do not fail the whole batch; they are returned as
    /// [`UndecodableMessage`] entries for the caller to dead-letter.
    pub async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<Delivery<T>>, MessagingError> {
        let raw = self
            .service
            .receive(&self.name, max_messages, visibility_timeout)
            .await?;

        Ok(raw
            .into_iter()
            .map(|delivery| match T::from_bytes(&delivery.message) {
                Ok(message) => Ok(delivery.map(|_| message)),
                Err(error) => Err(UndecodableMessage { delivery, error }),
            })
            .collect())
    }

    pub async fn ack(&self, receipt_handle: &ReceiptHandle) -> Result<(), MessagingError> {
        self.service.ack(&self.name, receipt_handle).await
    }

    pub async fn release(
        &self,
        receipt_handle: &ReceiptHandle,
        delay: Duration,
    ) -> Result<(), MessagingError> {
        self.service.release(&self.name, receipt_handle, delay).await
    }

    pub async fn dead_letter(
        &self,
        receipt_handle: &ReceiptHandle,
        reason: &str,
    ) -> Result<(), MessagingError> {
        self.service
            .dead_letter(&self.name, receipt_handle, reason)
            .await
    }

    pub async fn stats(&self) -> Result<QueueStats, MessagingError> {
        self.service.queue_stats(&self.name).await
    }
}
