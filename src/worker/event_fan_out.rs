//! # Event Fan-out Stage
//!
//! Consumes the event queue. For every registered processor, in registry
//! order, an event becomes either a processor job (the processor declares
//! interest in the event name, exactly or through `*`) or, for the websocket
//! relay, one copy of the raw event on the relay queue.
//!
//! All enqueues of one event run concurrently. A failed enqueue is logged on
//! its own and does not stop the others; once every branch has settled the
//! job fails with an error naming each failed branch, so the queue retries
//! the whole fan-out. Branches that already succeeded are enqueued again on
//! that retry.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, info};

use super::consumer::{Job, JobHandler};
use crate::constants::{Resource, Stage};
use crate::error::{BranchFailure, DispatchError, FanOutRoute, Result};
use crate::messaging::{Event, MessageId, MessagingError, ProcessorJob};
use crate::queues::{DispatchQueue, QueueSet};
use crate::registry::HandlerRegistry;

/// Enqueues made for one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Processors that received a job, in registry order
    pub processor_jobs: Vec<String>,
    /// Whether the raw event was put on the relay queue
    pub relayed: bool,
}

impl FanOutReport {
    pub fn branch_count(&self) -> usize {
        self.processor_jobs.len() + usize::from(self.relayed)
    }
}

#[derive(Debug, Clone)]
pub struct EventFanOut {
    registry: Arc<HandlerRegistry>,
    processor_queue: DispatchQueue<ProcessorJob>,
    websocket_queue: DispatchQueue<Event>,
}

impl EventFanOut {
    pub fn new(registry: Arc<HandlerRegistry>, queues: &QueueSet) -> Self {
        Self {
            registry,
            processor_queue: queues.processors.clone(),
            websocket_queue: queues.websockets.clone(),
        }
    }

    /// Dispatch one event to every interested processor and the relay
    pub async fn fan_out(&self, event: &Event) -> Result<FanOutReport> {
        let branches = self
            .registry
            .processors()
            .filter_map(|entry| {
                if entry.is_relay() {
                    Some((entry.name.as_str(), FanOutRoute::Relay))
                } else if entry.wants(&event.name) {
                    Some((entry.name.as_str(), FanOutRoute::Processor))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        let outcomes = join_all(
            branches
                .iter()
                .map(|&(name, route)| self.enqueue_branch(event, name, route)),
        )
        .await;

        let mut report = FanOutReport::default();
        let mut failures = Vec::new();

        for (&(name, route), outcome) in branches.iter().zip(outcomes) {
            match outcome {
                Ok(message_id) => {
                    debug!(processor = %name, route = %route, message_id = %message_id, "Branch enqueued");
                    match route {
                        FanOutRoute::Relay => report.relayed = true,
                        FanOutRoute::Processor => report.processor_jobs.push(name.to_string()),
                    }
                }
                Err(err) => {
                    error!(
                        event = %event.name,
                        processor = %name,
                        route = %route,
                        error = %err,
                        payload = %event.payload,
                        actor_id = ?event.context.actor_id,
                        "Failed to dispatch event to processor"
                    );
                    failures.push(BranchFailure {
                        processor_name: name.to_string(),
                        route,
                        error: err,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::FanOut {
                event_name: event.name.clone(),
                failures,
            });
        }

        info!(
            event = %event.name,
            processor_jobs = report.processor_jobs.len(),
            relayed = report.relayed,
            "Event dispatched"
        );
        Ok(report)
    }

    async fn enqueue_branch(
        &self,
        event: &Event,
        processor_name: &str,
        route: FanOutRoute,
    ) -> std::result::Result<MessageId, MessagingError> {
        match route {
            FanOutRoute::Relay => self.websocket_queue.add(event).await,
            FanOutRoute::Processor => {
                self.processor_queue
                    .add(&ProcessorJob::new(event.clone(), processor_name))
                    .await
            }
        }
    }
}

#[async_trait]
impl JobHandler<Event> for EventFanOut {
    fn stage(&self) -> Stage {
        Stage::EventFanOut
    }

    fn resource(&self, data: &Event) -> Resource {
        Resource::Event(data.name.clone())
    }

    async fn handle(&self, job: &Job<Event>) -> Result<()> {
        info!(
            event = %job.data.name,
            attempt = job.attempt(),
            actor_id = ?job.data.context.actor_id,
            "Processing {}",
            job.data.name
        );
        self.fan_out(&job.data).await.map(|_| ())
    }
}
