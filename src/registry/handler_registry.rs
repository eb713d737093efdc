//! # Handler Registry
//!
//! Static name → implementation table for processors and tasks.
//!
//! The registry is assembled once at startup through [`HandlerRegistryBuilder`]
//! and is immutable afterwards; share it behind an `Arc`. Names are validated
//! when the registry is built, so registration mistakes surface before any
//! job is consumed rather than as failures deep inside a stage.
//!
//! ## Usage
//!
//! ```rust
//! use dispatch_core::messaging::Event;
//! use dispatch_core::registry::{HandlerRegistry, Processor};
//!
//! #[derive(Default)]
//! struct BacklinksProcessor;
//!
//! #[async_trait::async_trait]
//! impl Processor for BacklinksProcessor {
//!     async fn perform(&self, event: &Event) -> anyhow::Result<()> {
//!         tracing::info!(event = %event.name, "updating backlinks");
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = HandlerRegistry::builder()
//!     .processor::<BacklinksProcessor>("BacklinksProcessor", ["documents.publish", "documents.update"])
//!     .websockets_relay()
//!     .build()?;
//!
//! assert!(registry.processor("BacklinksProcessor").is_ok());
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::processor::{EventInterest, Processor, ProcessorEntry, ProcessorKind};
use super::task::{Task, TaskEntry};
use crate::constants::WEBSOCKETS_PROCESSOR;
use crate::error::{DispatchError, Result};

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_processors: usize,
    pub total_tasks: usize,
    pub passive_processors: usize,
    pub has_relay: bool,
}

/// Immutable processor and task registry
#[derive(Debug)]
pub struct HandlerRegistry {
    /// Processors in registration order
    processors: Vec<ProcessorEntry>,
    processor_index: HashMap<String, usize>,
    tasks: HashMap<String, TaskEntry>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Registered processors, in registration order
    pub fn processors(&self) -> impl Iterator<Item = &ProcessorEntry> {
        self.processors.iter()
    }

    /// Resolve a processor by exact name
    pub fn processor(&self, name: &str) -> Result<&ProcessorEntry> {
        self.processor_index
            .get(name)
            .map(|&idx| &self.processors[idx])
            .ok_or_else(|| DispatchError::unregistered_processor(name))
    }

    /// Resolve a task by exact name
    pub fn task(&self, name: &str) -> Result<&TaskEntry> {
        self.tasks
            .get(name)
            .ok_or_else(|| DispatchError::unregistered_task(name))
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_processors: self.processors.len(),
            total_tasks: self.tasks.len(),
            passive_processors: self
                .processors
                .iter()
                .filter(|p| matches!(p.kind, ProcessorKind::Passive))
                .count(),
            has_relay: self.processors.iter().any(ProcessorEntry::is_relay),
        }
    }
}

/// Collects registrations and validates them in [`build`](Self::build)
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    processors: Vec<ProcessorEntry>,
    tasks: Vec<TaskEntry>,
}

impl HandlerRegistryBuilder {
    /// Register a processor constructed with `Default` for every job
    pub fn processor<P>(
        self,
        name: impl Into<String>,
        applicable_events: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self
    where
        P: Processor + Default + 'static,
    {
        self.processor_with(name, applicable_events, P::default)
    }

    /// Register a processor built by `factory` for every job
    pub fn processor_with<P, F>(
        mut self,
        name: impl Into<String>,
        applicable_events: impl IntoIterator<Item = impl Into<String>>,
        factory: F,
    ) -> Self
    where
        P: Processor + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.processors.push(ProcessorEntry {
            name: name.into(),
            applicable_events: EventInterest::from_names(applicable_events),
            kind: ProcessorKind::Handler(Arc::new(move || {
                Box::new(factory()) as Box<dyn Processor>
            })),
        });
        self
    }

    /// Register a processor without a handling capability
    pub fn passive_processor(
        mut self,
        name: impl Into<String>,
        applicable_events: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.processors.push(ProcessorEntry {
            name: name.into(),
            applicable_events: EventInterest::from_names(applicable_events),
            kind: ProcessorKind::Passive,
        });
        self
    }

    /// Register the websocket relay, which receives every event on the relay queue
    pub fn websockets_relay(mut self) -> Self {
        self.processors.push(ProcessorEntry {
            name: WEBSOCKETS_PROCESSOR.to_string(),
            applicable_events: EventInterest::none(),
            kind: ProcessorKind::Relay,
        });
        self
    }

    /// Register a task constructed with `Default` for every job
    pub fn task<T>(self, name: impl Into<String>) -> Self
    where
        T: Task + Default + 'static,
    {
        self.task_with(name, T::default)
    }

    /// Register a task built by `factory` for every job
    pub fn task_with<T, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        T: Task + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.tasks.push(TaskEntry::new(
            name,
            Arc::new(move || Box::new(factory()) as Box<dyn Task>),
        ));
        self
    }

    /// Validate registrations and freeze the registry
    ///
    /// Rejects empty names and duplicate processor or task names. Whatever
    /// way it was registered, the processor named [`WEBSOCKETS_PROCESSOR`]
    /// becomes the websocket relay and its declared interest is dropped.
    pub fn build(self) -> Result<HandlerRegistry> {
        let mut processors = self.processors;
        let mut processor_index = HashMap::with_capacity(processors.len());

        for (idx, entry) in processors.iter_mut().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(DispatchError::configuration(
                    "Processor registered with an empty name",
                ));
            }
            if processor_index.insert(entry.name.clone(), idx).is_some() {
                return Err(DispatchError::configuration(format!(
                    "Processor \"{}\" is registered more than once",
                    entry.name
                )));
            }
            if entry.name == WEBSOCKETS_PROCESSOR && !entry.is_relay() {
                debug!(processor = %entry.name, kind = ?entry.kind, "Registering processor as the websocket relay");
                entry.kind = ProcessorKind::Relay;
                entry.applicable_events = EventInterest::none();
            }
            debug!(processor = %entry.name, kind = ?entry.kind, "Registered processor");
        }

        let mut seen = HashSet::with_capacity(self.tasks.len());
        let mut tasks = HashMap::with_capacity(self.tasks.len());
        for entry in self.tasks {
            if entry.name.trim().is_empty() {
                return Err(DispatchError::configuration(
                    "Task registered with an empty name",
                ));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(DispatchError::configuration(format!(
                    "Task \"{}\" is registered more than once",
                    entry.name
                )));
            }
            debug!(task = %entry.name, "Registered task");
            tasks.insert(entry.name.clone(), entry);
        }

        let registry = HandlerRegistry {
            processors,
            processor_index,
            tasks,
        };

        let stats = registry.stats();
        info!(
            processors = stats.total_processors,
            tasks = stats.total_tasks,
            relay = stats.has_relay,
            "Handler registry built"
        );

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Event;
    use async_trait::async_trait;

    #[derive(Default)]
    struct NoopProcessor;

    #[async_trait]
    impl Processor for NoopProcessor {
        async fn perform(&self, _event: &Event) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopTask;

    #[async_trait]
    impl Task for NoopTask {
        async fn perform(&self, _props: &serde_json::Value) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_processors_keep_registration_order() {
        let registry = HandlerRegistry::builder()
            .processor::<NoopProcessor>("B", ["*"])
            .websockets_relay()
            .passive_processor("A", ["documents.create"])
            .build()
            .unwrap();

        assert_eq!(
            registry.processor_names(),
            vec!["B", "WebsocketsProcessor", "A"]
        );
        assert_eq!(
            registry.stats(),
            RegistryStats {
                total_processors: 3,
                total_tasks: 0,
                passive_processors: 1,
                has_relay: true,
            }
        );
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = HandlerRegistry::builder()
            .processor::<NoopProcessor>("BacklinksProcessor", ["documents.update"])
            .task::<NoopTask>("SendEmail")
            .build()
            .unwrap();

        assert!(registry.processor("BacklinksProcessor").is_ok());
        assert!(matches!(
            registry.processor("backlinksprocessor"),
            Err(DispatchError::UnregisteredHandler { .. })
        ));
        assert!(registry.task("SendEmail").is_ok());
        assert!(matches!(
            registry.task("Unregistered"),
            Err(DispatchError::UnregisteredHandler { .. })
        ));
    }

    #[test]
    fn test_duplicate_processor_rejected() {
        let result = HandlerRegistry::builder()
            .passive_processor("A", ["*"])
            .processor::<NoopProcessor>("A", ["documents.create"])
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("registered more than once"));
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let result = HandlerRegistry::builder()
            .task::<NoopTask>("SendEmail")
            .task::<NoopTask>("SendEmail")
            .build();
        assert!(matches!(result, Err(DispatchError::Configuration(_))));
    }

    #[test]
    fn test_relay_is_recognised_by_name() {
        let registry = HandlerRegistry::builder()
            .passive_processor("WebsocketsProcessor", ["*"])
            .build()
            .unwrap();

        let relay = registry.processor(WEBSOCKETS_PROCESSOR).unwrap();
        assert!(relay.is_relay());
        assert!(!relay.wants("documents.create"));
        assert!(registry.stats().has_relay);
        assert_eq!(registry.stats().passive_processors, 0);
    }

    #[test]
    fn test_second_relay_rejected() {
        let result = HandlerRegistry::builder()
            .websockets_relay()
            .processor::<NoopProcessor>("WebsocketsProcessor", Vec::<String>::new())
            .build();
        assert!(matches!(result, Err(DispatchError::Configuration(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = HandlerRegistry::builder().passive_processor(" ", ["*"]).build();
        assert!(matches!(result, Err(DispatchError::Configuration(_))));
    }

    #[test]
    fn test_factory_builds_fresh_instances() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let registry = HandlerRegistry::builder()
            .task_with("CountingTask", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                NoopTask
            })
            .build()
            .unwrap();

        let entry = registry.task("CountingTask").unwrap();
        let _first = entry.instantiate();
        let _second = entry.instantiate();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }
}
