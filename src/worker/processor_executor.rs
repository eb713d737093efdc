//! # Processor Execution Stage
//!
//! Consumes processor jobs: resolves the named processor, builds a fresh
//! instance and hands it the event.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::consumer::{Job, JobHandler};
use crate::constants::{Resource, Stage};
use crate::error::{DispatchError, Result};
use crate::logging::log_job_error;
use crate::messaging::ProcessorJob;
use crate::registry::HandlerRegistry;

/// What running a processor job amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorOutcome {
    Handled,
    /// The processor has no handling capability; nothing ran
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ProcessorExecutor {
    registry: Arc<HandlerRegistry>,
}

impl ProcessorExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, job: &ProcessorJob) -> Result<ProcessorOutcome> {
        let entry = self.registry.processor(&job.processor_name)?;

        if entry.is_relay() {
            return Err(DispatchError::configuration(format!(
                "Processor \"{}\" is the websocket relay and cannot run processor jobs",
                entry.name
            )));
        }
        let Some(processor) = entry.instantiate() else {
            debug!(processor = %entry.name, event = %job.event.name, "Processor has no handler, skipping");
            return Ok(ProcessorOutcome::Skipped);
        };

        info!(
            processor = %entry.name,
            event = %job.event.name,
            actor_id = ?job.event.context.actor_id,
            "{} running {}",
            entry.name,
            job.event.name
        );
        if let Err(err) = processor.perform(&job.event).await {
            let context = serde_json::json!({
                "processor": entry.name,
                "event": &job.event,
            });
            log_job_error(
                Stage::ProcessorExecution.as_str(),
                "perform",
                &format!("{err:#}"),
                &context,
            );
            return Err(DispatchError::Handler(err));
        }

        debug!(processor = %entry.name, event = %job.event.name, "Processor completed");
        Ok(ProcessorOutcome::Handled)
    }
}

#[async_trait]
impl JobHandler<ProcessorJob> for ProcessorExecutor {
    fn stage(&self) -> Stage {
        Stage::ProcessorExecution
    }

    fn resource(&self, data: &ProcessorJob) -> Resource {
        Resource::Processor(data.processor_name.clone())
    }

    async fn handle(&self, job: &Job<ProcessorJob>) -> Result<()> {
        self.execute(&job.data).await.map(|_| ())
    }
}
