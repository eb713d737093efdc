#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatch Core
//!
//! Asynchronous event-and-task dispatch pipeline.
//!
//! ## Overview
//!
//! Domain events are published onto a shared event queue and fanned out to
//! every registered processor that declared interest in the event name.
//! Named background tasks are scheduled onto a task queue and executed
//! directly. Every stage is an independent queue consumer with at-least-once
//! delivery, retry with backoff and a dead-letter store, so handlers must be
//! idempotent.
//!
//! ## Architecture
//!
//! ```text
//! publish_event ──► events ──► EventFanOut ──┬──► processors ──► ProcessorExecutor
//!                                            └──► websockets  (external relay)
//! schedule_task ──► tasks  ──► TaskExecutor
//! ```
//!
//! ## Module Organization
//!
//! - [`registry`] - Processor and task registration by name
//! - [`messaging`] - Queue service abstraction, payload types, in-memory provider
//! - [`queues`] - Typed handles for the four dispatch queues
//! - [`worker`] - Consumer runtime, the three stages and worker bootstrap
//! - [`config`] - Layered configuration loading
//! - [`logging`] - Structured logging and job spans
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dispatch_core::config::ConfigManager;
//! use dispatch_core::messaging::{Event, InMemoryMessagingService};
//! use dispatch_core::registry::HandlerRegistry;
//! use dispatch_core::worker::DispatchWorker;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! dispatch_core::logging::init_structured_logging(&manager.config().logging);
//!
//! let registry = HandlerRegistry::builder()
//!     .passive_processor("AuditProcessor", ["*"])
//!     .websockets_relay()
//!     .build()?;
//!
//! let worker = DispatchWorker::start(
//!     manager.config(),
//!     Arc::new(registry),
//!     Arc::new(InMemoryMessagingService::new()),
//! )
//! .await;
//!
//! worker
//!     .queues()
//!     .publish_event(&Event::new("documents.create", serde_json::json!({"id": "doc"})))
//!     .await?;
//!
//! worker.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod queues;
pub mod registry;
pub mod worker;

pub use config::{ConfigManager, DispatchConfig};
pub use constants::{Resource, Stage};
pub use error::{DispatchError, Result};
pub use messaging::{Event, EventContext, MessagingService, ProcessorJob, TaskJob};
pub use queues::QueueSet;
pub use registry::{HandlerRegistry, Processor, Task};
pub use worker::{DispatchWorker, WorkerHandle};
