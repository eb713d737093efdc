//! # Task Execution Stage
//!
//! Consumes task jobs: resolves the task by name before anything is built,
//! then runs a fresh instance with the scheduled props.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::consumer::{Job, JobHandler};
use crate::constants::{Resource, Stage};
use crate::error::{DispatchError, Result};
use crate::logging::log_job_error;
use crate::messaging::TaskJob;
use crate::registry::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct TaskExecutor {
    registry: Arc<HandlerRegistry>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, job: &TaskJob) -> Result<()> {
        let entry = self.registry.task(&job.task_name)?;
        let task = entry.instantiate();

        info!(task = %entry.name, props = %job.props, "{} running", entry.name);

        if let Err(err) = task.perform(&job.props).await {
            let context = serde_json::json!({
                "task": entry.name,
                "props": &job.props,
            });
            log_job_error(
                Stage::TaskExecution.as_str(),
                "perform",
                &format!("{err:#}"),
                &context,
            );
            return Err(DispatchError::Handler(err));
        }

        debug!(task = %entry.name, "Task completed");
        Ok(())
    }
}

#[async_trait]
impl JobHandler<TaskJob> for TaskExecutor {
    fn stage(&self) -> Stage {
        Stage::TaskExecution
    }

    fn resource(&self, data: &TaskJob) -> Resource {
        Resource::Task(data.task_name.clone())
    }

    async fn handle(&self, job: &Job<TaskJob>) -> Result<()> {
        self.execute(&job.data).await
    }
}
