//! Dispatch counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorMetrics {
    pub commands_received: u64,
    pub alerts: u64,
    pub silences: u64,
    pub unsupported: u64,
    pub backend_failures: u64,
    pub abandoned_responses: u64,
}

/// Live counters, written by the dispatch loop only
#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    commands_received: AtomicU64,
    alerts: AtomicU64,
    silences: AtomicU64,
    unsupported: AtomicU64,
    backend_failures: AtomicU64,
    abandoned_responses: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    Received,
    Alert,
    Silence,
    Unsupported,
    BackendFailure,
    AbandonedResponse,
}

impl DispatchCounters {
    pub(crate) fn incr(&self, counter: Counter) {
        let slot = match counter {
            Counter::Received => &self.commands_received,
            Counter::Alert => &self.alerts,
            Counter::Silence => &self.silences,
            Counter::Unsupported => &self.unsupported,
            Counter::BackendFailure => &self.backend_failures,
            Counter::AbandonedResponse => &self.abandoned_responses,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            commands_received: self.commands_received.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            silences: self.silences.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            abandoned_responses: self.abandoned_responses.load(Ordering::Relaxed),
        }
    }
}
