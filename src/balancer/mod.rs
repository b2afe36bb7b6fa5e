/// Weighted instance selector
///
/// Resolves a destination path to one live host: classify the path, fetch
/// discovered instances, apply whitelist filtering when asked, then pick by
/// weighted random choice. When live discovery is empty the selector falls
/// back to the last stack snapshot from the backup subsystem; when that is
/// empty too, the outcome is "no hosts" — an absent result plus a metric
/// increment, never an error, and never retried internally.
pub mod discovery;
pub mod weigher;
pub mod whitelist;

pub use discovery::{format_stack_path, DiscoveryProvider, InMemoryDiscovery, Instance, StackPath};
pub use weigher::InstanceWeigher;
pub use whitelist::Whitelist;

use crate::backup::snapshot::StackSnapshot;
use crate::metrics::MetricsSink;
use arc_swap::{ArcSwap, ArcSwapOption};
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Whitelist handling for one resolve call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Serve from any discovered stack
    NoFilter,
    /// Serve only from whitelisted stacks
    WhitelistOnly,
}

pub struct Balancer {
    discovery: Arc<dyn DiscoveryProvider>,
    weigher: InstanceWeigher,
    whitelist: ArcSwap<Whitelist>,
    /// Last-known-good snapshot, installed by the backup subsystem
    snapshot: ArcSwapOption<StackSnapshot>,
    service_name: String,
    metrics: Arc<dyn MetricsSink>,
}

impl Balancer {
    pub fn new(
        discovery: Arc<dyn DiscoveryProvider>,
        weigher: InstanceWeigher,
        service_name: String,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            discovery,
            weigher,
            whitelist: ArcSwap::from_pointee(Whitelist::new()),
            snapshot: ArcSwapOption::empty(),
            service_name,
            metrics,
        }
    }

    /// Replace the whitelist wholesale
    pub fn set_whitelist(&self, whitelist: Whitelist) {
        self.whitelist.store(Arc::new(whitelist));
    }

    pub fn whitelist(&self) -> Arc<Whitelist> {
        self.whitelist.load_full()
    }

    /// Install the fallback snapshot (restored or freshly captured)
    pub fn set_snapshot(&self, snapshot: StackSnapshot) {
        self.snapshot.store(Some(Arc::new(snapshot)));
    }

    /// Resolve a destination path to one instance, or absent when no host
    /// qualifies
    pub fn resolve(&self, path: &str, mode: FilterMode) -> Option<Instance> {
        let candidates = self.candidates(path, mode);
        let selected = self.weighted_pick(candidates);
        if selected.is_none() {
            debug!(path, "no hosts found");
            self.metrics.no_hosts_found();
        }
        selected
    }

    /// Number of instances that would qualify for selection
    pub fn count_instances(&self, path: &str, mode: FilterMode) -> usize {
        self.candidates(path, mode).len()
    }

    /// Gather instances for a path: live discovery first, snapshot fallback
    /// second, whitelist filter applied per mode
    ///
    /// Lookup paths are re-derived against the snapshot's own key set on the
    /// fallback read, so flavor-only destinations resolve even when live
    /// discovery knows no stacks at all.
    fn candidates(&self, path: &str, mode: FilterMode) -> Vec<Instance> {
        let mut live: Vec<Instance> = self
            .lookup_paths(path, || self.discovery.stack_paths())
            .iter()
            .flat_map(|p| self.discovery.instances_for(p))
            .collect();

        if live.is_empty() {
            if let Some(snapshot) = self.snapshot.load_full() {
                live = self
                    .lookup_paths(path, || snapshot.stack_paths())
                    .iter()
                    .flat_map(|p| snapshot.instances_for(p))
                    .collect();
                if !live.is_empty() {
                    debug!(path, version = snapshot.version, "serving from snapshot fallback");
                }
            }
        }

        match mode {
            FilterMode::NoFilter => live,
            FilterMode::WhitelistOnly => {
                let whitelist = self.whitelist.load();
                live.retain(|inst| whitelist.permits(&inst.path));
                live
            }
        }
    }

    /// Concrete lookup paths for a destination path
    ///
    /// A stack-based path gets the caller's service name appended when it
    /// lacks one. A flavor-only path matches every known stack carrying that
    /// flavor for this service; the key set comes from whichever source is
    /// being consulted, so only flavor-only lookups pay for the enumeration.
    fn lookup_paths(&self, path: &str, known_paths: impl FnOnce() -> Vec<String>) -> Vec<String> {
        if path.starts_with('/') {
            match path.parse::<StackPath>() {
                Ok(stack) => {
                    let full = if stack.service.is_none() {
                        stack.with_service(self.service_name.clone())
                    } else {
                        stack
                    };
                    vec![full.to_string()]
                }
                Err(_) => {
                    debug!(path, "unresolvable stack path");
                    Vec::new()
                }
            }
        } else {
            known_paths()
                .into_iter()
                .filter(|full| {
                    full.parse::<StackPath>().is_ok_and(|p| {
                        p.flavor == path && p.service.as_deref() == Some(&self.service_name)
                    })
                })
                .collect()
        }
    }

    /// Weighted random choice; zero total weight selects nothing
    fn weighted_pick(&self, candidates: Vec<Instance>) -> Option<Instance> {
        if candidates.is_empty() {
            return None;
        }

        let weights: Vec<u32> = candidates.iter().map(|i| self.weigher.weight(i)).collect();
        let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
        if total == 0 {
            return None;
        }

        let mut draw = rand::thread_rng().gen_range(0..total);
        for (instance, weight) in candidates.into_iter().zip(weights) {
            let weight = u64::from(weight);
            if draw < weight {
                return Some(instance);
            }
            draw -= weight;
        }
        None
    }
}
