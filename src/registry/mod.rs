//! # Handler Registry
//!
//! Startup-time table of the processors and tasks this worker knows about.
//!
//! ## Overview
//!
//! Processors react to events and declare which event names they care
//! about; tasks are invoked directly by name. Both are resolved by exact
//! name lookup and instantiated fresh for every job through a factory, so
//! no per-job state leaks between invocations.
//!
//! ```text
//! HandlerRegistry
//! ├── processors   (ordered; Handler | Passive | Relay)
//! └── tasks        (name → factory)
//! ```

pub mod handler_registry;
pub mod processor;
pub mod task;

pub use handler_registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryStats};
pub use processor::{EventInterest, Processor, ProcessorEntry, ProcessorFactory, ProcessorKind};
pub use task::{Task, TaskEntry, TaskFactory};
