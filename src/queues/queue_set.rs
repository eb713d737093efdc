//! The four dispatch queues, constructed together and injected into stages.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::dispatch_queue::DispatchQueue;
use crate::config::QueueNamesConfig;
use crate::messaging::{
    Event, MessageId, MessagingError, MessagingService, ProcessorJob, QueueHealthReport, TaskJob,
};

/// Handles for the event, processor job, websocket relay and task queues
///
/// ```text
/// producers ──► events ──► [fan-out] ──► processors ──► [processor execution]
///                               └──────► websockets (consumed elsewhere)
/// producers ──► tasks ──► [task execution]
/// ```
#[derive(Clone)]
pub struct QueueSet {
    pub events: DispatchQueue<Event>,
    pub processors: DispatchQueue<ProcessorJob>,
    /// Raw events for the websocket collaborator; never consumed here
    pub websockets: DispatchQueue<Event>,
    pub tasks: DispatchQueue<TaskJob>,
    service: Arc<dyn MessagingService>,
}

impl std::fmt::Debug for QueueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSet")
            .field("queues", &self.names())
            .field("provider", &self.service.provider_name())
            .finish()
    }
}

impl QueueSet {
    pub fn new(names: &QueueNamesConfig, service: Arc<dyn MessagingService>) -> Self {
        Self {
            events: DispatchQueue::new(&names.events, Arc::clone(&service)),
            processors: DispatchQueue::new(&names.processors, Arc::clone(&service)),
            websockets: DispatchQueue::new(&names.websockets, Arc::clone(&service)),
            tasks: DispatchQueue::new(&names.tasks, Arc::clone(&service)),
            service,
        }
    }

    pub fn service(&self) -> &Arc<dyn MessagingService> {
        &self.service
    }

    pub fn names(&self) -> [&str; 4] {
        [
            self.events.name(),
            self.processors.name(),
            self.websockets.name(),
            self.tasks.name(),
        ]
    }

    /// Create every queue that does not exist yet
    pub async fn ensure_all(&self) -> Result<(), MessagingError> {
        let names: Vec<String> = self.names().iter().map(|n| n.to_string()).collect();
        self.service.ensure_queues(&names).await?;
        debug!(queues = ?names, provider = self.service.provider_name(), "Dispatch queues ready");
        Ok(())
    }

    pub async fn verify(&self) -> Result<QueueHealthReport, MessagingError> {
        let names: Vec<String> = self.names().iter().map(|n| n.to_string()).collect();
        self.service.verify_queues(&names).await
    }

    /// Publish a domain event for fan-out
    pub async fn publish_event(&self, event: &Event) -> Result<MessageId, MessagingError> {
        let id = self.events.add(event).await?;
        debug!(event = %event.name, message_id = %id, "Event published");
        Ok(id)
    }

    /// Schedule a named task
    pub async fn schedule_task(
        &self,
        task_name: impl Into<String>,
        props: serde_json::Value,
    ) -> Result<MessageId, MessagingError> {
        let job = TaskJob::new(task_name, props);
        let id = self.tasks.add(&job).await?;
        debug!(task = %job.task_name, message_id = %id, "Task scheduled");
        Ok(id)
    }

    /// Log final statistics for every queue
    pub async fn close(&self) {
        for name in self.names() {
            match self.service.queue_stats(name).await {
                Ok(stats) => info!(
                    queue = %name,
                    pending = stats.message_count,
                    in_flight = stats.in_flight_count,
                    dead_lettered = stats.dead_letter_count,
                    sent = stats.total_sent,
                    acked = stats.total_acked,
                    "Queue closed"
                ),
                Err(e) => warn!(queue = %name, error = %e, "Could not read queue statistics on close"),
            }
        }
    }
}
