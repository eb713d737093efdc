//! # Task Descriptors
//!
//! Tasks are named units of background work invoked directly, with no event
//! matching. Unlike processors, every task must be able to run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Background work entry point
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task with the props it was scheduled with
    async fn perform(&self, props: &serde_json::Value) -> anyhow::Result<()>;
}

/// Builds a fresh task instance for every job
pub type TaskFactory = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// A registered task
#[derive(Clone)]
pub struct TaskEntry {
    pub name: String,
    factory: TaskFactory,
}

impl TaskEntry {
    pub fn new(name: impl Into<String>, factory: TaskFactory) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    pub fn instantiate(&self) -> Box<dyn Task> {
        (self.factory)()
    }
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry")
            .field("name", &self.name)
            .field("factory", &"<TaskFactory>")
            .finish()
    }
}
