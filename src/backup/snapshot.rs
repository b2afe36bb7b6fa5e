/// Stack snapshots: versioned captures of discovered instances
///
/// A snapshot is written whenever discovery data changes meaningfully and
/// loaded on restart, giving the balancer a non-empty fallback before live
/// discovery has populated. Snapshots are immutable once written and carry a
/// monotonically increasing version.

use crate::balancer::discovery::{DiscoveryProvider, Instance};
use crate::backup::{BackupEntity, BackupRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One host as captured in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub ipv4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
}

impl From<&Instance> for HostRecord {
    fn from(instance: &Instance) -> Self {
        Self {
            ipv4: instance.ipv4.clone(),
            ipv6: instance.ipv6.clone(),
            weight: instance.weight.clone(),
        }
    }
}

/// Point-in-time capture of every discovered stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub version: u64,
    pub stacks: BTreeMap<String, Vec<HostRecord>>,
}

impl StackSnapshot {
    pub fn new(version: u64, stacks: BTreeMap<String, Vec<HostRecord>>) -> Self {
        Self { version, stacks }
    }

    /// Capture the current discovery state
    pub fn capture(version: u64, discovery: &dyn DiscoveryProvider) -> Self {
        let stacks = discovery
            .all_stacks()
            .iter()
            .map(|(path, instances)| {
                (
                    path.clone(),
                    instances.iter().map(HostRecord::from).collect(),
                )
            })
            .collect();
        Self { version, stacks }
    }

    /// Reconstruct instances for one stack path
    pub fn instances_for(&self, path: &str) -> Vec<Instance> {
        self.stacks
            .get(path)
            .map(|hosts| {
                hosts
                    .iter()
                    .map(|host| Instance {
                        path: path.to_string(),
                        ipv4: host.ipv4.clone(),
                        ipv6: host.ipv6.clone(),
                        weight: host.weight.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every stack whose application segment is excluded
    ///
    /// Excluded applications are expected to re-register quickly and should
    /// not be served from possibly-stale backup data.
    pub fn without_apps(mut self, excluded: &HashSet<String>) -> Self {
        if excluded.is_empty() {
            return self;
        }
        self.stacks.retain(|path, _| {
            let app = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
            !excluded.contains(app)
        });
        self
    }

    /// Full paths of every captured stack
    pub fn stack_paths(&self) -> Vec<String> {
        self.stacks.keys().cloned().collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

/// Persists discovery snapshots with a monotonic version counter
pub struct SnapshotWriter {
    registry: Arc<BackupRegistry>,
    version: AtomicU64,
}

impl SnapshotWriter {
    pub fn new(registry: Arc<BackupRegistry>) -> Self {
        Self {
            registry,
            version: AtomicU64::new(0),
        }
    }

    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Capture discovery state into the next snapshot version and persist it
    pub async fn capture(&self, discovery: &dyn DiscoveryProvider) -> Option<StackSnapshot> {
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = StackSnapshot::capture(version, discovery);
        self.persist(BackupEntity::StackSnapshot, &snapshot).await
    }

    /// Operator-triggered capture into the manual backup entity
    pub async fn capture_manual(&self, discovery: &dyn DiscoveryProvider) -> Option<StackSnapshot> {
        let snapshot = StackSnapshot::capture(self.current_version(), discovery);
        self.persist(BackupEntity::ManualStackBackup, &snapshot).await
    }

    async fn persist(
        &self,
        entity: BackupEntity,
        snapshot: &StackSnapshot,
    ) -> Option<StackSnapshot> {
        let payload = match snapshot.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "snapshot serialization failed");
                return None;
            }
        };
        if self.registry.backup(entity, payload).await {
            info!(version = snapshot.version, stacks = snapshot.stacks.len(), "snapshot persisted");
            Some(snapshot.clone())
        } else {
            None
        }
    }

    /// Load the last persisted snapshot, dropping excluded applications
    ///
    /// Advances the version counter so later captures stay monotonic across
    /// restarts.
    pub async fn restore(&self, excluded: &HashSet<String>) -> Option<StackSnapshot> {
        let raw = self.registry.load(BackupEntity::StackSnapshot).await?;
        match StackSnapshot::from_json(&raw) {
            Ok(snapshot) => {
                self.version.fetch_max(snapshot.version, Ordering::Relaxed);
                Some(snapshot.without_apps(excluded))
            }
            Err(e) => {
                warn!(error = %e, "stored snapshot is unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::discovery::InMemoryDiscovery;

    fn discovery_with(paths: &[(&str, &str)]) -> InMemoryDiscovery {
        let discovery = InMemoryDiscovery::new();
        for (path, ip) in paths {
            discovery.register(Instance::new(*path, *ip).with_weight("3"));
        }
        discovery
    }

    #[test]
    fn test_capture_reflects_discovery() {
        let discovery = discovery_with(&[
            ("/po/poc6/guide/xreGuide", "10.0.0.1"),
            ("/po/poc6/guide/xreGuide", "10.0.0.2"),
            ("/po/poc7/sports/xreApp", "10.0.1.1"),
        ]);

        let snapshot = StackSnapshot::capture(3, &discovery);
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.stacks.len(), 2);
        assert_eq!(snapshot.stacks["/po/poc6/guide/xreGuide"].len(), 2);
    }

    #[test]
    fn test_instances_round_trip_through_records() {
        let discovery = discovery_with(&[("/po/poc6/guide/xreGuide", "10.0.0.1")]);
        let snapshot = StackSnapshot::capture(1, &discovery);

        let restored = snapshot.instances_for("/po/poc6/guide/xreGuide");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].ipv4, "10.0.0.1");
        assert_eq!(restored[0].weight.as_deref(), Some("3"));
        assert_eq!(restored[0].path, "/po/poc6/guide/xreGuide");

        assert!(snapshot.instances_for("/no/such/stack").is_empty());
    }

    #[test]
    fn test_without_apps_filters_by_trailing_segment() {
        let discovery = discovery_with(&[
            ("/po/poc6/a/test1", "10.0.0.1"),
            ("/po/poc6/b/test2", "10.0.0.2"),
            ("/po/poc6/c/xreGuide", "10.0.0.3"),
            ("/po/poc6/d/xreTest", "10.0.0.4"),
            ("/po/poc7/e/xreTest", "10.0.0.5"),
        ]);
        let snapshot = StackSnapshot::capture(1, &discovery);

        let excluded: HashSet<String> = ["xreTest".to_string()].into_iter().collect();
        let filtered = snapshot.without_apps(&excluded);

        assert_eq!(filtered.stacks.len(), 3);
        assert!(filtered.stacks.contains_key("/po/poc6/a/test1"));
        assert!(filtered.stacks.contains_key("/po/poc6/b/test2"));
        assert!(filtered.stacks.contains_key("/po/poc6/c/xreGuide"));
        assert!(!filtered.stacks.keys().any(|p| p.ends_with("xreTest")));
    }

    #[test]
    fn test_json_round_trip() {
        let discovery = discovery_with(&[("/po/poc6/guide/xreGuide", "10.0.0.1")]);
        let snapshot = StackSnapshot::capture(9, &discovery);

        let json = snapshot.to_json().unwrap();
        let back = StackSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[tokio::test]
    async fn test_writer_versions_are_monotonic() {
        let registry = Arc::new(BackupRegistry::in_memory());
        let writer = SnapshotWriter::new(Arc::clone(&registry));
        let discovery = discovery_with(&[("/po/poc6/guide/xreGuide", "10.0.0.1")]);

        let first = writer.capture(&discovery).await.unwrap();
        let second = writer.capture(&discovery).await.unwrap();
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_restore_filters_and_resumes_versioning() {
        let registry = Arc::new(BackupRegistry::in_memory());
        let writer = SnapshotWriter::new(Arc::clone(&registry));
        let discovery = discovery_with(&[
            ("/po/poc6/a/xreGuide", "10.0.0.1"),
            ("/po/poc6/b/xreTest", "10.0.0.2"),
        ]);
        writer.capture(&discovery).await.unwrap();

        // Fresh writer simulating a restart
        let restarted = SnapshotWriter::new(Arc::clone(&registry));
        let excluded: HashSet<String> = ["xreTest".to_string()].into_iter().collect();
        let restored = restarted.restore(&excluded).await.unwrap();

        assert_eq!(restored.stacks.len(), 1);
        assert!(restored.stacks.contains_key("/po/poc6/a/xreGuide"));

        // Next capture must not reuse a version
        let next = restarted.capture(&discovery).await.unwrap();
        assert!(next.version > restored.version);
    }

    #[tokio::test]
    async fn test_restore_with_nothing_stored() {
        let registry = Arc::new(BackupRegistry::in_memory());
        let writer = SnapshotWriter::new(registry);
        assert!(writer.restore(&HashSet::new()).await.is_none());
    }
}
