//! # System Constants
//!
//! Well-known names shared by the dispatch stages, the registry and the
//! default configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interest marker that matches every event name
pub const WILDCARD_EVENT: &str = "*";

/// Name under which the websocket relay processor is registered
pub const WEBSOCKETS_PROCESSOR: &str = "WebsocketsProcessor";

/// Service name attached to every job span
pub const WORKER_SERVICE_NAME: &str = "worker";

/// Default queue names
pub mod queues {
    pub const EVENTS: &str = "globalEvents";
    pub const PROCESSORS: &str = "processors";
    pub const WEBSOCKETS: &str = "websockets";
    pub const TASKS: &str = "tasks";
}

/// Pipeline stages, used as consumer identifiers in logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    EventFanOut,
    ProcessorExecution,
    TaskExecution,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::EventFanOut => "event_fan_out",
            Stage::ProcessorExecution => "processor_execution",
            Stage::TaskExecution => "task_execution",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of registered handler, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Processor,
    Task,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Processor => f.write_str("Processor"),
            HandlerKind::Task => f.write_str("Task"),
        }
    }
}

/// Resource identifier attached to the tracing context of a unit of work
///
/// Renders as `Event.<name>`, `Processor.<name>` or `Task.<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Event(String),
    Processor(String),
    Task(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Event(name) => write!(f, "Event.{name}"),
            Resource::Processor(name) => write!(f, "Processor.{name}"),
            Resource::Task(name) => write!(f, "Task.{name}"),
        }
    }
}
