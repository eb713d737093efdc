//! # Messaging Module
//!
//! Queue-based messaging for the dispatch pipeline: the provider-agnostic
//! durable queue contract, its in-memory provider and the message payloads
//! carried between stages.

pub mod errors;
pub mod message;
pub mod providers;
pub mod traits;
pub mod types;

pub use errors::{MessagingError, MessagingResult};
pub use message::{Event, EventContext, ProcessorJob, TaskJob};
pub use providers::{DeadLetter, InMemoryMessagingService};
pub use traits::{MessagingService, QueueMessage};
pub use types::{MessageId, QueueHealthReport, QueueStats, QueuedMessage, ReceiptHandle};
