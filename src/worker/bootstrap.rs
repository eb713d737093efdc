//! # Worker Bootstrap
//!
//! Starts the three consuming stages as independent tasks and hands back a
//! [`WorkerHandle`] that owns their lifecycle.
//!
//! ```text
//! DispatchWorker::start
//!   ├── QueueSet (events, processors, websockets, tasks)
//!   ├── spawn QueueConsumer<Event>        + EventFanOut
//!   ├── spawn QueueConsumer<ProcessorJob> + ProcessorExecutor
//!   └── spawn QueueConsumer<TaskJob>      + TaskExecutor
//! ```
//!
//! A consumer that fails to start logs a fatal record and stays down; the
//! other consumers keep running.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::consumer::{ConsumerSettings, JobHandler, QueueConsumer};
use super::event_fan_out::EventFanOut;
use super::metrics::StageMetrics;
use super::processor_executor::ProcessorExecutor;
use super::task_executor::TaskExecutor;
use crate::config::DispatchConfig;
use crate::constants::Stage;
use crate::error::Result;
use crate::messaging::{MessagingService, QueueMessage};
use crate::queues::{DispatchQueue, QueueSet};
use crate::registry::HandlerRegistry;

pub struct DispatchWorker;

impl DispatchWorker {
    /// Start all stages on the current tokio runtime
    pub async fn start(
        config: &DispatchConfig,
        registry: Arc<HandlerRegistry>,
        service: Arc<dyn MessagingService>,
    ) -> WorkerHandle {
        let worker_id = format!("worker-{}", uuid::Uuid::new_v4());
        let queues = QueueSet::new(&config.queues, service);
        let settings = ConsumerSettings::from_config(config);
        let metrics = StageMetrics::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Consumers create their own queue; the relay queue has none here
        if let Err(e) = queues.ensure_all().await {
            warn!(worker_id = %worker_id, error = %e, "Could not create every dispatch queue up front");
        }

        let consumers = vec![
            spawn_consumer(
                queues.events.clone(),
                EventFanOut::new(Arc::clone(&registry), &queues),
                &settings,
                &metrics,
                &shutdown_rx,
            ),
            spawn_consumer(
                queues.processors.clone(),
                ProcessorExecutor::new(Arc::clone(&registry)),
                &settings,
                &metrics,
                &shutdown_rx,
            ),
            spawn_consumer(
                queues.tasks.clone(),
                TaskExecutor::new(Arc::clone(&registry)),
                &settings,
                &metrics,
                &shutdown_rx,
            ),
        ];

        let registry_stats = registry.stats();
        info!(
            worker_id = %worker_id,
            provider = queues.service().provider_name(),
            processors = registry_stats.total_processors,
            tasks = registry_stats.total_tasks,
            concurrency = settings.concurrency,
            "Dispatch worker started"
        );

        WorkerHandle {
            worker_id,
            started_at: Utc::now(),
            shutdown_tx,
            consumers,
            queues,
            metrics,
        }
    }
}

fn spawn_consumer<T, H>(
    queue: DispatchQueue<T>,
    handler: H,
    settings: &ConsumerSettings,
    metrics: &StageMetrics,
    shutdown: &watch::Receiver<bool>,
) -> (Stage, JoinHandle<Result<()>>)
where
    T: QueueMessage,
    H: JobHandler<T>,
{
    let stage = handler.stage();
    let consumer = QueueConsumer::new(queue, Arc::new(handler), settings.clone(), metrics.clone());
    (stage, tokio::spawn(consumer.run(shutdown.clone())))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerStatus {
    pub stage: Stage,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub started_at: DateTime<Utc>,
    pub consumers: Vec<ConsumerStatus>,
}

impl WorkerStatus {
    pub fn all_running(&self) -> bool {
        self.consumers.iter().all(|c| c.running)
    }
}

/// Result of stopping a worker
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub stopped: Vec<Stage>,
    /// Consumers that failed to start or aborted
    pub failed: Vec<Stage>,
}

/// Running worker; dropping it without [`shutdown`](Self::shutdown) stops
/// consumers without waiting for their in-flight jobs
#[derive(Debug)]
pub struct WorkerHandle {
    worker_id: String,
    started_at: DateTime<Utc>,
    shutdown_tx: watch::Sender<bool>,
    consumers: Vec<(Stage, JoinHandle<Result<()>>)>,
    queues: QueueSet,
    metrics: StageMetrics,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Queue handles, for producers living in the same process
    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            worker_id: self.worker_id.clone(),
            started_at: self.started_at,
            consumers: self
                .consumers
                .iter()
                .map(|(stage, handle)| ConsumerStatus {
                    stage: *stage,
                    running: !handle.is_finished(),
                })
                .collect(),
        }
    }

    /// Signal every consumer, wait for in-flight jobs and log final queue stats
    pub async fn shutdown(self) -> ShutdownReport {
        info!(worker_id = %self.worker_id, "Dispatch worker shutdown requested");
        // receivers may already be gone if every consumer ended
        let _ = self.shutdown_tx.send(true);

        let mut report = ShutdownReport::default();
        for (stage, handle) in self.consumers {
            match handle.await {
                Ok(Ok(())) => report.stopped.push(stage),
                Ok(Err(e)) => {
                    warn!(stage = %stage, error = %e, "Consumer had not started");
                    report.failed.push(stage);
                }
                Err(e) => {
                    error!(stage = %stage, error = %e, "Consumer task aborted");
                    report.failed.push(stage);
                }
            }
        }

        self.queues.close().await;
        info!(
            worker_id = %self.worker_id,
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "Dispatch worker stopped"
        );
        report
    }
}
