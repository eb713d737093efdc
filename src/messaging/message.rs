//! # Message Structures for Dispatch Queues
//!
//! Payloads carried by the four dispatch queues: raw [`Event`]s on the event
//! and websocket relay queues, [`ProcessorJob`]s on the processor queue and
//! [`TaskJob`]s on the task queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, payload-bearing domain fact
///
/// Events carry no dedup key: the same event may be delivered more than once
/// and consumers must tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name (e.g., "documents.create")
    pub name: String,
    /// Event payload
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Originating actor and model metadata
    #[serde(default)]
    pub context: EventContext,
    /// When the event was published
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Originating actor/context metadata for an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// User that caused the event
    pub actor_id: Option<Uuid>,
    /// Team the event belongs to
    pub team_id: Option<Uuid>,
    /// Primary model the event is about
    pub model_id: Option<Uuid>,
    /// Client address of the originating request
    pub ip: Option<String>,
}

impl Event {
    /// Create a new event with empty context
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            context: EventContext::default(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Attach originating context
    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = context;
        self
    }
}

/// One event addressed to one processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorJob {
    pub event: Event,
    pub processor_name: String,
}

impl ProcessorJob {
    pub fn new(event: Event, processor_name: impl Into<String>) -> Self {
        Self {
            event,
            processor_name: processor_name.into(),
        }
    }
}

/// A named background task invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskJob {
    pub task_name: String,
    #[serde(default)]
    pub props: serde_json::Value,
}

impl TaskJob {
    pub fn new(task_name: impl Into<String>, props: serde_json::Value) -> Self {
        Self {
            task_name: task_name.into(),
            props,
        }
    }
}
