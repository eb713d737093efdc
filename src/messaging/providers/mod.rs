//! # Messaging Providers
//!
//! Concrete [`MessagingService`](super::MessagingService) implementations.

pub mod in_memory;

pub use in_memory::{DeadLetter, InMemoryMessagingService};
