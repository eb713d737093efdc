//! # Dispatch Queues
//!
//! Typed queue handles over a [`MessagingService`](crate::messaging::MessagingService).
//! A [`QueueSet`] is built once from configuration and shared by the
//! producers and the three consuming stages.

pub mod dispatch_queue;
pub mod queue_set;

pub use dispatch_queue::{Delivery, DispatchQueue, UndecodableMessage};
pub use queue_set::QueueSet;
