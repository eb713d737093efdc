//! # Queue Consumer
//!
//! Long-running polling loop that drives one stage over one queue.
//!
//! ```text
//! loop:
//!   acquire permit(s) ──► receive ──► spawn job ──► handler.handle(job)
//!        ▲                   │                          │
//!        │              empty: sleep              Ok  ► ack
//!        └── shutdown ◄──────┘                    Err ► release with backoff
//!                                                       | dead-letter
//! ```
//!
//! Concurrency is bounded by a semaphore sized from `consumer.concurrency`.
//! Every message stays leased for `consumer.visibility_timeout_seconds`
//! while its job runs; a job that outlives its lease may be delivered again,
//! which handlers tolerate as part of at-least-once delivery.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use super::metrics::StageMetrics;
use super::retry::{RetryDecision, RetryPolicy};
use crate::config::DispatchConfig;
use crate::constants::{Resource, Stage};
use crate::error::{DispatchError, Result};
use crate::logging::{job_span, log_fatal};
use crate::messaging::{MessageId, QueueMessage, QueuedMessage, ReceiptHandle};
use crate::queues::{Delivery, DispatchQueue, UndecodableMessage};

/// One delivery of a queued payload
#[derive(Debug, Clone)]
pub struct Job<T> {
    pub id: MessageId,
    pub data: T,
    /// Attempts completed before this one
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl<T> Job<T> {
    /// 1-based number of the running attempt
    pub fn attempt(&self) -> u32 {
        self.attempts_made + 1
    }
}

/// Work performed for each job of a queue
///
/// Returning `Ok` acknowledges the job. Returning `Err` fails the attempt;
/// [`DispatchError::is_retryable`] then decides between a delayed retry and
/// the dead-letter store.
#[async_trait]
pub trait JobHandler<T>: Send + Sync + 'static {
    fn stage(&self) -> Stage;

    /// Resource id of the job, used for its span and metrics
    fn resource(&self, data: &T) -> Resource;

    async fn handle(&self, job: &Job<T>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub visibility_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ConsumerSettings {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            concurrency: config.consumer.concurrency.max(1),
            poll_interval: config.consumer.poll_interval(),
            visibility_timeout: config.consumer.visibility_timeout(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// Per-job state shared by every spawned job of one consumer
struct JobRunner<T, H> {
    queue: DispatchQueue<T>,
    handler: Arc<H>,
    retry: RetryPolicy,
    metrics: StageMetrics,
}

pub struct QueueConsumer<T, H> {
    runner: Arc<JobRunner<T, H>>,
    settings: ConsumerSettings,
}

impl<T, H> std::fmt::Debug for QueueConsumer<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConsumer")
            .field("queue", &self.runner.queue.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl<T, H> QueueConsumer<T, H>
where
    T: QueueMessage,
    H: JobHandler<T>,
{
    pub fn new(
        queue: DispatchQueue<T>,
        handler: Arc<H>,
        settings: ConsumerSettings,
        metrics: StageMetrics,
    ) -> Self {
        Self {
            runner: Arc::new(JobRunner {
                queue,
                handler,
                retry: settings.retry.clone(),
                metrics,
            }),
            settings,
        }
    }

    /// Consume until `shutdown` flips to `true` or its sender is dropped
    ///
    /// In-flight jobs are awaited before returning. Fails only when the
    /// consumer cannot start; job failures never end the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let stage = self.runner.handler.stage();
        let queue_name = self.runner.queue.name().to_string();

        if let Err(e) = self.runner.queue.ensure().await {
            log_fatal(stage.as_str(), "start_consumer", &e.to_string());
            return Err(DispatchError::ConsumerStartup {
                stage: stage.to_string(),
                queue_name,
                message: e.to_string(),
            });
        }

        info!(
            stage = %stage,
            queue = %queue_name,
            concurrency = self.settings.concurrency,
            "Queue consumer started"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut in_flight = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            while let Some(Some(finished)) = in_flight.join_next().now_or_never() {
                log_join_result(stage, finished);
            }

            let first = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let mut permits = vec![first];
            while let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() {
                permits.push(permit);
            }

            let deliveries = match self
                .runner
                .queue
                .receive(permits.len(), self.settings.visibility_timeout)
                .await
            {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    warn!(stage = %stage, queue = %queue_name, error = %e, "Failed to receive messages");
                    Vec::new()
                }
            };

            if deliveries.is_empty() {
                drop(permits);
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                }
                continue;
            }

            debug!(stage = %stage, received = deliveries.len(), "Received messages");

            for (delivery, permit) in deliveries.into_iter().zip(permits) {
                let runner = Arc::clone(&self.runner);
                in_flight.spawn(async move {
                    let _permit = permit;
                    runner.process(delivery).await;
                });
            }
        }

        let draining = in_flight.len();
        if draining > 0 {
            info!(stage = %stage, in_flight = draining, "Waiting for in-flight jobs");
        }
        while let Some(finished) = in_flight.join_next().await {
            log_join_result(stage, finished);
        }

        info!(stage = %stage, queue = %queue_name, "Queue consumer stopped");
        Ok(())
    }
}

fn log_join_result(stage: Stage, result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(stage = %stage, error = %e, "Job task aborted");
    }
}

impl<T, H> JobRunner<T, H>
where
    T: QueueMessage,
    H: JobHandler<T>,
{
    async fn process(&self, delivery: Delivery<T>) {
        match delivery {
            Ok(message) => self.run_job(message).await,
            Err(undecodable) => self.reject(undecodable).await,
        }
    }

    async fn run_job(&self, message: QueuedMessage<T>) {
        let resource = self.handler.resource(&message.message);
        let attempt = message.receive_count.max(1);
        let receipt = message.receipt_handle;
        let job = Job {
            id: message.message_id,
            data: message.message,
            attempts_made: attempt - 1,
            enqueued_at: message.enqueued_at,
        };

        let span = job_span(&resource, attempt);
        async {
            let outcome = AssertUnwindSafe(self.handler.handle(&job))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    Err(DispatchError::Handler(anyhow::anyhow!(
                        "handler panicked: {reason}"
                    )))
                });

            match outcome {
                Ok(()) => {
                    self.metrics.record_completed(&resource);
                    if let Err(e) = self.queue.ack(&receipt).await {
                        warn!(message_id = %job.id, error = %e, "Failed to acknowledge job; it may be delivered again");
                    }
                    debug!(message_id = %job.id, "Job completed");
                }
                Err(err) => {
                    self.metrics.record_failed(&resource);
                    self.settle_failure(&job, &receipt, &resource, attempt, &err)
                        .await;
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn settle_failure(
        &self,
        job: &Job<T>,
        receipt: &ReceiptHandle,
        resource: &Resource,
        attempt: u32,
        err: &DispatchError,
    ) {
        match self.retry.decide(attempt, err.is_retryable()) {
            RetryDecision::Retry(delay) => {
                warn!(
                    message_id = %job.id,
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "Job failed, scheduling retry"
                );
                match self.queue.release(receipt, delay).await {
                    Ok(()) => self.metrics.record_retried(resource),
                    Err(e) => {
                        warn!(message_id = %job.id, error = %e, "Failed to release job; it will reappear after its lease")
                    }
                }
            }
            RetryDecision::DeadLetter(cause) => {
                error!(
                    message_id = %job.id,
                    attempt,
                    cause = cause.as_str(),
                    error = %err,
                    "Job failed permanently, moving to dead-letter store"
                );
                match self.queue.dead_letter(receipt, &err.to_string()).await {
                    Ok(()) => self.metrics.record_dead_lettered(resource),
                    Err(e) => {
                        error!(message_id = %job.id, error = %e, "Failed to dead-letter job")
                    }
                }
            }
        }
    }

    async fn reject(&self, undecodable: UndecodableMessage) {
        let message_id = undecodable.delivery.message_id;
        error!(
            stage = %self.handler.stage(),
            queue = %self.queue.name(),
            message_id = %message_id,
            error = %undecodable.error,
            "Undecodable message, moving to dead-letter store"
        );
        if let Err(e) = self
            .queue
            .dead_letter(&undecodable.delivery.receipt_handle, &undecodable.error.to_string())
            .await
        {
            error!(message_id = %message_id, error = %e, "Failed to dead-letter undecodable message");
        }
    }
}
