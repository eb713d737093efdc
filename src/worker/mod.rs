//! # Dispatch Worker
//!
//! The three consuming stages and the runtime that drives them:
//!
//! - [`EventFanOut`]: event queue → processor jobs and relay copies
//! - [`ProcessorExecutor`]: processor jobs → `Processor::perform`
//! - [`TaskExecutor`]: task jobs → `Task::perform`
//!
//! Each stage implements [`JobHandler`] and runs inside its own
//! [`QueueConsumer`]. [`DispatchWorker::start`] wires all three together.

pub mod bootstrap;
pub mod consumer;
pub mod event_fan_out;
pub mod metrics;
pub mod processor_executor;
pub mod retry;
pub mod task_executor;

pub use bootstrap::{ConsumerStatus, DispatchWorker, ShutdownReport, WorkerHandle, WorkerStatus};
pub use consumer::{ConsumerSettings, Job, JobHandler, QueueConsumer};
pub use event_fan_out::{EventFanOut, FanOutReport};
pub use metrics::{ResourceMetrics, StageMetrics};
pub use processor_executor::{ProcessorExecutor, ProcessorOutcome};
pub use retry::{DeadLetterCause, RetryDecision, RetryPolicy};
pub use task_executor::TaskExecutor;
