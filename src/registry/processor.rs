//! # Processor Descriptors
//!
//! Processors react to events. Each registered processor declares the event
//! names it is interested in and one of three kinds:
//!
//! - [`ProcessorKind::Handler`]: builds a fresh [`Processor`] per job
//! - [`ProcessorKind::Passive`]: participates in fan-out but has no handling
//!   capability; its jobs succeed without doing anything
//! - [`ProcessorKind::Relay`]: the websocket relay; fan-out routes raw events
//!   to the relay queue instead of creating processor jobs

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::WILDCARD_EVENT;
use crate::messaging::Event;

/// Event handling capability of a processor
#[async_trait]
pub trait Processor: Send + Sync {
    /// Handle one event
    ///
    /// Delivery is at-least-once: the same event may reach a processor more
    /// than once, so implementations must be idempotent.
    async fn perform(&self, event: &Event) -> anyhow::Result<()>;
}

/// Builds a fresh processor instance for every job
pub type ProcessorFactory = Arc<dyn Fn() -> Box<dyn Processor> + Send + Sync>;

/// Event names a processor wants to receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventInterest {
    /// Every event (the `*` marker)
    All,
    /// Exactly these event names
    Only(BTreeSet<String>),
}

impl EventInterest {
    /// Build from a declared name list; `*` anywhere in the list means all events
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.contains(WILDCARD_EVENT) {
            EventInterest::All
        } else {
            EventInterest::Only(names)
        }
    }

    /// No events at all
    pub fn none() -> Self {
        EventInterest::Only(BTreeSet::new())
    }

    pub fn matches(&self, event_name: &str) -> bool {
        match self {
            EventInterest::All => true,
            EventInterest::Only(names) => names.contains(event_name),
        }
    }
}

#[derive(Clone)]
pub enum ProcessorKind {
    Handler(ProcessorFactory),
    Passive,
    Relay,
}

impl fmt::Debug for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Handler(_) => f.write_str("Handler(<factory>)"),
            ProcessorKind::Passive => f.write_str("Passive"),
            ProcessorKind::Relay => f.write_str("Relay"),
        }
    }
}

/// A registered processor
#[derive(Debug, Clone)]
pub struct ProcessorEntry {
    pub name: String,
    pub applicable_events: EventInterest,
    pub kind: ProcessorKind,
}

impl ProcessorEntry {
    pub fn is_relay(&self) -> bool {
        matches!(self.kind, ProcessorKind::Relay)
    }

    /// Whether fan-out should create a processor job for this event
    ///
    /// Always false for the relay, whatever its declared interest.
    pub fn wants(&self, event_name: &str) -> bool {
        !self.is_relay() && self.applicable_events.matches(event_name)
    }

    /// Create a fresh instance, if this processor can handle events
    pub fn instantiate(&self) -> Option<Box<dyn Processor>> {
        match &self.kind {
            ProcessorKind::Handler(factory) => Some(factory()),
            ProcessorKind::Passive | ProcessorKind::Relay => None,
        }
    }
}
