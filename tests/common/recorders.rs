use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use dispatch_core::messaging::Event;
use dispatch_core::registry::{HandlerRegistryBuilder, Processor, Task};

/// One observed handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub handler: String,
    pub input: Value,
}

/// Shared log of handler invocations across fresh handler instances
#[derive(Debug, Clone, Default)]
pub struct InvocationRecorder {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl InvocationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, handler: &str, input: Value) {
        self.calls.lock().push(RecordedCall {
            handler: handler.to_string(),
            input,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn count_for(&self, handler: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.handler == handler)
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }
}

pub struct RecordingProcessor {
    name: String,
    recorder: InvocationRecorder,
    failure: Option<String>,
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn perform(&self, event: &Event) -> anyhow::Result<()> {
        self.recorder
            .record(&self.name, serde_json::to_value(event)?);
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

pub struct RecordingTask {
    name: String,
    recorder: InvocationRecorder,
    failure: Option<String>,
}

#[async_trait]
impl Task for RecordingTask {
    async fn perform(&self, props: &Value) -> anyhow::Result<()> {
        self.recorder.record(&self.name, props.clone());
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

/// Extension methods registering recording stubs
pub trait RecordingRegistrations {
    fn recording_processor(
        self,
        name: &str,
        events: &[&str],
        recorder: &InvocationRecorder,
    ) -> Self;

    fn failing_processor(
        self,
        name: &str,
        events: &[&str],
        recorder: &InvocationRecorder,
        message: &str,
    ) -> Self;

    fn recording_task(self, name: &str, recorder: &InvocationRecorder) -> Self;

    fn failing_task(self, name: &str, recorder: &InvocationRecorder, message: &str) -> Self;
}

fn processor_factory(
    name: &str,
    recorder: &InvocationRecorder,
    failure: Option<&str>,
) -> impl Fn() -> RecordingProcessor + Send + Sync + 'static {
    let name = name.to_string();
    let recorder = recorder.clone();
    let failure = failure.map(str::to_string);
    move || RecordingProcessor {
        name: name.clone(),
        recorder: recorder.clone(),
        failure: failure.clone(),
    }
}

fn task_factory(
    name: &str,
    recorder: &InvocationRecorder,
    failure: Option<&str>,
) -> impl Fn() -> RecordingTask + Send + Sync + 'static {
    let name = name.to_string();
    let recorder = recorder.clone();
    let failure = failure.map(str::to_string);
    move || RecordingTask {
        name: name.clone(),
        recorder: recorder.clone(),
        failure: failure.clone(),
    }
}

impl RecordingRegistrations for HandlerRegistryBuilder {
    fn recording_processor(
        self,
        name: &str,
        events: &[&str],
        recorder: &InvocationRecorder,
    ) -> Self {
        self.processor_with(
            name,
            events.iter().copied(),
            processor_factory(name, recorder, None),
        )
    }

    fn failing_processor(
        self,
        name: &str,
        events: &[&str],
        recorder: &InvocationRecorder,
        message: &str,
    ) -> Self {
        self.processor_with(
            name,
            events.iter().copied(),
            processor_factory(name, recorder, Some(message)),
        )
    }

    fn recording_task(self, name: &str, recorder: &InvocationRecorder) -> Self {
        self.task_with(name, task_factory(name, recorder, None))
    }

    fn failing_task(self, name: &str, recorder: &InvocationRecorder, message: &str) -> Self {
        self.task_with(name, task_factory(name, recorder, Some(message)))
    }
}
