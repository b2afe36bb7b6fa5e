/// Redirection engine facade
///
/// Owns the compiled decision models, the namespaced list repository, the
/// balancer, and the backup registry, and wires them into the two
/// request-path operations: `redirect` (flavor routing to a concrete
/// instance) and `url_params` (URL parameter cascade). Model installs and
/// every other mutation swap immutable value objects; in-flight requests
/// finish against whichever generation they started with.

use crate::backup::{BackupEntity, BackupRegistry, SnapshotWriter, StackSnapshot};
use crate::balancer::{Balancer, DiscoveryProvider, FilterMode, Instance, InstanceWeigher, Whitelist};
use crate::config::Config;
use crate::error::RuleError;
use crate::lists::{NamespacedList, NamespacedListRepository};
use crate::metrics::MetricsSink;
use crate::rules::{Context, DecisionModel, Destination, UrlDecisionModel, UrlParams};
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// Metadata persisted alongside the installed models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelMetadata {
    pub version: u64,
    pub updated_at: u64,
}

pub struct Redirector {
    model: ArcSwapOption<DecisionModel>,
    url_model: ArcSwapOption<UrlDecisionModel>,
    lists: Arc<NamespacedListRepository>,
    balancer: Balancer,
    backup: Arc<BackupRegistry>,
    snapshots: SnapshotWriter,
    discovery: Arc<dyn DiscoveryProvider>,
    metrics: Arc<dyn MetricsSink>,
    excluded_apps: HashSet<String>,
    model_version: AtomicU64,
}

impl Redirector {
    pub fn new(
        config: &Config,
        discovery: Arc<dyn DiscoveryProvider>,
        backup: Arc<BackupRegistry>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let weigher = InstanceWeigher::new(
            config.balancer.default_weight,
            config.balancer.max_weight,
        );
        let balancer = Balancer::new(
            Arc::clone(&discovery),
            weigher,
            config.balancer.service_name.clone(),
            Arc::clone(&metrics),
        );
        Self {
            model: ArcSwapOption::empty(),
            url_model: ArcSwapOption::empty(),
            lists: Arc::new(NamespacedListRepository::new()),
            balancer,
            backup: Arc::clone(&backup),
            snapshots: SnapshotWriter::new(backup),
            discovery,
            metrics,
            excluded_apps: config.backup.excluded_apps.iter().cloned().collect(),
            model_version: AtomicU64::new(0),
        }
    }

    pub fn lists(&self) -> &NamespacedListRepository {
        &self.lists
    }

    pub fn balancer(&self) -> &Balancer {
        &self.balancer
    }

    pub fn has_model(&self) -> bool {
        self.model.load().is_some()
    }

    /// Compile and install a flavor-routing rule document
    ///
    /// Fails closed: on any compilation error the previous model stays
    /// authoritative and the document is not backed up.
    pub async fn install_rules(&self, raw: &str) -> Result<(), RuleError> {
        match DecisionModel::from_json(raw) {
            Ok(model) => {
                info!(rules = model.rule_count(), "installing rule model");
                self.model.store(Some(Arc::new(model)));
                self.persist(BackupEntity::Rules, raw.to_string()).await;
                self.persist_metadata().await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "rule compilation failed, keeping previous model");
                self.metrics.failure();
                Err(e)
            }
        }
    }

    /// Compile and install a URL-routing rule document
    pub async fn install_url_rules(&self, raw: &str) -> Result<(), RuleError> {
        match UrlDecisionModel::from_json(raw) {
            Ok(model) => {
                info!(rules = model.rule_count(), "installing url rule model");
                self.url_model.store(Some(Arc::new(model)));
                self.persist(BackupEntity::UrlRules, raw.to_string()).await;
                self.persist_metadata().await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "url rule compilation failed, keeping previous model");
                self.metrics.failure();
                Err(e)
            }
        }
    }

    /// Replace the whitelist and back it up
    pub async fn install_whitelist(&self, whitelist: Whitelist) {
        match serde_json::to_string(&whitelist) {
            Ok(payload) => self.persist(BackupEntity::Whitelist, payload).await,
            Err(e) => warn!(error = %e, "whitelist serialization failed"),
        }
        self.balancer.set_whitelist(whitelist);
    }

    /// Replace every namespaced list and back them up
    pub async fn install_lists(&self, lists: Vec<NamespacedList>) {
        match serde_json::to_string(&lists) {
            Ok(payload) => self.persist(BackupEntity::NamespacedLists, payload).await,
            Err(e) => warn!(error = %e, "namespaced list serialization failed"),
        }
        self.lists.replace_all(lists);
    }

    /// Record the known application names
    pub async fn install_applications(&self, applications: Vec<String>) {
        match serde_json::to_string(&applications) {
            Ok(payload) => self.persist(BackupEntity::Applications, payload).await,
            Err(e) => warn!(error = %e, "application list serialization failed"),
        }
    }

    /// Evaluate the rule model against a request context
    pub fn decide(&self, ctx: &Context) -> Option<Destination> {
        let model = self.model.load_full()?;
        model.execute(ctx, &self.lists).cloned()
    }

    /// Full redirect: evaluate rules, then resolve to one instance
    ///
    /// Explicit-URL destinations resolve to no instance here; the caller
    /// formats the redirect from the destination itself.
    pub fn redirect(&self, ctx: &Context, mode: FilterMode) -> Option<Instance> {
        let started = Instant::now();
        let destination = self.decide(ctx)?;
        let server = destination.server();
        let resolved = match &server.path {
            Some(path) => self.balancer.resolve(path, mode),
            None => None,
        };
        self.metrics.redirect_duration(started.elapsed());
        resolved
    }

    /// URL parameter cascade; without a model only default-tier merging runs
    pub fn url_params(&self, ctx: &Context, fallback: &UrlParams) -> UrlParams {
        match self.url_model.load_full() {
            Some(model) => model.execute(ctx, &self.lists, fallback),
            None => fallback.clone(),
        }
    }

    /// Capture current discovery state into a persisted snapshot and make
    /// it the balancer's fallback
    pub async fn capture_snapshot(&self) -> Option<StackSnapshot> {
        let snapshot = self.snapshots.capture(self.discovery.as_ref()).await?;
        self.balancer.set_snapshot(snapshot.clone());
        Some(snapshot)
    }

    /// Operator-triggered capture into the manual backup entity
    pub async fn capture_manual_backup(&self) -> Option<StackSnapshot> {
        self.snapshots.capture_manual(self.discovery.as_ref()).await
    }

    /// Restore engine state from the backup registry
    ///
    /// Called on startup before live discovery and the coordination store
    /// have populated; every entity is optional and failures only log.
    pub async fn restore_from_backup(&self) {
        if let Some(raw) = self.backup.load(BackupEntity::Rules).await {
            if self.install_rules_from_restore(&raw) {
                info!("rule model restored from backup");
            }
        }
        if let Some(raw) = self.backup.load(BackupEntity::UrlRules).await {
            match UrlDecisionModel::from_json(&raw) {
                Ok(model) => {
                    self.url_model.store(Some(Arc::new(model)));
                    info!("url rule model restored from backup");
                }
                Err(e) => warn!(error = %e, "backed-up url rules are unreadable"),
            }
        }
        if let Some(raw) = self.backup.load(BackupEntity::Whitelist).await {
            match serde_json::from_str::<Whitelist>(&raw) {
                Ok(whitelist) => self.balancer.set_whitelist(whitelist),
                Err(e) => warn!(error = %e, "backed-up whitelist is unreadable"),
            }
        }
        if let Some(raw) = self.backup.load(BackupEntity::NamespacedLists).await {
            match serde_json::from_str::<Vec<NamespacedList>>(&raw) {
                Ok(lists) => self.lists.replace_all(lists),
                Err(e) => warn!(error = %e, "backed-up namespaced lists are unreadable"),
            }
        }
        if let Some(snapshot) = self.snapshots.restore(&self.excluded_apps).await {
            info!(version = snapshot.version, "discovery snapshot restored from backup");
            self.balancer.set_snapshot(snapshot);
        }
    }

    fn install_rules_from_restore(&self, raw: &str) -> bool {
        match DecisionModel::from_json(raw) {
            Ok(model) => {
                self.model.store(Some(Arc::new(model)));
                true
            }
            Err(e) => {
                warn!(error = %e, "backed-up rules are unreadable");
                false
            }
        }
    }

    /// Fire-and-forget persistence; a failed write degrades freshness only
    async fn persist(&self, entity: BackupEntity, payload: String) {
        let backup = Arc::clone(&self.backup);
        tokio::spawn(async move {
            if !backup.backup(entity, payload).await {
                warn!(?entity, "backup write failed");
            }
        });
    }

    async fn persist_metadata(&self) {
        let version = self.model_version.fetch_add(1, Ordering::Relaxed) + 1;
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let metadata = ModelMetadata {
            version,
            updated_at,
        };
        match serde_json::to_string(&metadata) {
            Ok(payload) => self.persist(BackupEntity::ModelMetadata, payload).await,
            Err(e) => warn!(error = %e, "model metadata serialization failed"),
        }
    }
}
