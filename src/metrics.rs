/// Metrics sink interface
///
/// The engine reports routing failures and redirect durations through this
/// trait. Delivery is fire-and-forget: implementations must not block and
/// must not fail. The sink is injected at construction time; there is no
/// global facade or runtime backend discovery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Fire-and-forget metrics collaborator
pub trait MetricsSink: Send + Sync {
    /// A resolve attempt found no live or backed-up instance
    fn no_hosts_found(&self) {}

    /// A general engine failure (compilation, backup) occurred
    fn failure(&self) {}

    /// One full redirect decision completed in `duration`
    fn redirect_duration(&self, _duration: Duration) {}
}

/// Sink that drops everything, used when no collector is wired up
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Sink that counts events in-process
///
/// Useful for tests and for callers that scrape counters themselves instead
/// of pushing to an external collector.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    no_hosts: AtomicU64,
    failures: AtomicU64,
    redirects: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_hosts_count(&self) -> u64 {
        self.no_hosts.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn redirect_count(&self) -> u64 {
        self.redirects.load(Ordering::Relaxed)
    }
}

impl MetricsSink for CountingMetrics {
    fn no_hosts_found(&self) {
        self.no_hosts.fetch_add(1, Ordering::Relaxed);
    }

    fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn redirect_duration(&self, _duration: Duration) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }
}
