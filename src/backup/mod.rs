/// Backup / resilience subsystem
///
/// Persists and restores last-known-good snapshots of rules, distributions,
/// discovered stacks, and namespaced lists so the evaluator and balancer
/// keep functioning across outages of the external coordination store. The
/// set of persisted entities is known statically, so the registry is built
/// eagerly at startup; no lazy creation, no creation lock.
pub mod snapshot;
pub mod store;

pub use snapshot::{HostRecord, SnapshotWriter, StackSnapshot};
pub use store::{BackupStore, FileStore, InMemoryStore};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// A logical persisted artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupEntity {
    /// Flavor-routing rule document
    Rules,
    /// URL-routing rule document
    UrlRules,
    /// Approved stack paths
    Whitelist,
    /// Periodic discovery snapshot
    StackSnapshot,
    /// Operator-triggered discovery snapshot
    ManualStackBackup,
    /// Namespaced lists
    NamespacedLists,
    /// Known application names
    Applications,
    /// Metadata about the installed models
    ModelMetadata,
}

impl BackupEntity {
    pub const ALL: [BackupEntity; 8] = [
        BackupEntity::Rules,
        BackupEntity::UrlRules,
        BackupEntity::Whitelist,
        BackupEntity::StackSnapshot,
        BackupEntity::ManualStackBackup,
        BackupEntity::NamespacedLists,
        BackupEntity::Applications,
        BackupEntity::ModelMetadata,
    ];

    /// Fixed filename for the file-backed backend
    pub fn filename(&self) -> &'static str {
        match self {
            BackupEntity::Rules => "selectserver.json",
            BackupEntity::UrlRules => "urlrules.json",
            BackupEntity::Whitelist => "whitelist.json",
            BackupEntity::StackSnapshot => "stacks.json",
            BackupEntity::ManualStackBackup => "manualbackup.json",
            BackupEntity::NamespacedLists => "namespacedlists.json",
            BackupEntity::Applications => "applications.json",
            BackupEntity::ModelMetadata => "modelmetadata.json",
        }
    }

    /// Global entities skip the per-application subdirectory
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            BackupEntity::StackSnapshot | BackupEntity::NamespacedLists | BackupEntity::Applications
        )
    }
}

/// Eagerly built map of entity to store
///
/// One store exists per entity for the process lifetime. File-backed stores
/// spawn their writer task at construction, so a file-backed registry must
/// be built inside a tokio runtime.
pub struct BackupRegistry {
    stores: HashMap<BackupEntity, Arc<dyn BackupStore>>,
}

impl BackupRegistry {
    /// Registry with an in-memory store per entity
    pub fn in_memory() -> Self {
        let stores = BackupEntity::ALL
            .iter()
            .map(|entity| {
                (
                    *entity,
                    Arc::new(InMemoryStore::new()) as Arc<dyn BackupStore>,
                )
            })
            .collect();
        Self { stores }
    }

    /// Registry with a file store per entity under
    /// `base_path[/app_name]/filename`
    pub fn file_backed(base_path: &Path, app_name: &str) -> Self {
        let stores = BackupEntity::ALL
            .iter()
            .map(|entity| {
                let path = if entity.is_global() {
                    base_path.join(entity.filename())
                } else {
                    base_path.join(app_name).join(entity.filename())
                };
                (*entity, Arc::new(FileStore::new(path)) as Arc<dyn BackupStore>)
            })
            .collect();
        Self { stores }
    }

    /// The store for an entity; present for every entity by construction
    pub fn store(&self, entity: BackupEntity) -> Option<Arc<dyn BackupStore>> {
        self.stores.get(&entity).cloned()
    }

    /// Persist a payload for an entity
    pub async fn backup(&self, entity: BackupEntity, payload: String) -> bool {
        match self.store(entity) {
            Some(store) => store.backup(payload).await,
            None => {
                warn!(?entity, "no store registered");
                false
            }
        }
    }

    /// Load the last payload for an entity
    pub async fn load(&self, entity: BackupEntity) -> Option<String> {
        self.store(entity)?.load().await
    }
}
