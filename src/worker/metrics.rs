//! # Stage Metrics
//!
//! Per-resource job counters shared by all consumers of a worker. Keys are
//! resource identifiers (`Event.documents.create`, `Task.SendEmail`, ...).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::constants::Resource;

#[derive(Debug, Default)]
struct ResourceCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time counters for one resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StageMetrics {
    counters: Arc<DashMap<String, ResourceCounters>>,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, resource: &Resource, select: impl Fn(&ResourceCounters) -> &AtomicU64) {
        let entry = self.counters.entry(resource.to_string()).or_default();
        select(entry.value()).fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, resource: &Resource) {
        self.bump(resource, |c| &c.completed);
    }

    /// A failed attempt, whatever happens to the job next
    pub fn record_failed(&self, resource: &Resource) {
        self.bump(resource, |c| &c.failed);
    }

    pub fn record_retried(&self, resource: &Resource) {
        self.bump(resource, |c| &c.retried);
    }

    pub fn record_dead_lettered(&self, resource: &Resource) {
        self.bump(resource, |c| &c.dead_lettered);
    }

    pub fn get(&self, resource: &Resource) -> ResourceMetrics {
        self.counters
            .get(&resource.to_string())
            .map(|c| load(c.value()))
            .unwrap_or_default()
    }

    /// Counters for every resource seen so far, sorted by resource id
    pub fn snapshot(&self) -> BTreeMap<String, ResourceMetrics> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), load(entry.value())))
            .collect()
    }
}

fn load(counters: &ResourceCounters) -> ResourceMetrics {
    ResourceMetrics {
        completed: counters.completed.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
        retried: counters.retried.load(Ordering::Relaxed),
        dead_lettered: counters.dead_lettered.load(Ordering::Relaxed),
    }
}
