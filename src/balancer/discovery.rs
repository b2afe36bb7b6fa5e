/// Discovery data model and providers
///
/// A stack path is a 3-4 segment hierarchical address
/// (`/region/zone/flavor[/service]`). Discovered instances are registered
/// under a stack path by the external discovery mechanism; this module only
/// reads them. The in-memory provider keeps its map behind an atomic swap so
/// the request path never takes a lock.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Hierarchical address of one flavor deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackPath {
    pub region: String,
    pub zone: String,
    pub flavor: String,
    pub service: Option<String>,
}

impl StackPath {
    pub fn new<R, Z, F>(region: R, zone: Z, flavor: F) -> Self
    where
        R: Into<String>,
        Z: Into<String>,
        F: Into<String>,
    {
        Self {
            region: region.into(),
            zone: zone.into(),
            flavor: flavor.into(),
            service: None,
        }
    }

    /// Append a service name, replacing any existing one
    pub fn with_service<S: Into<String>>(mut self, service: S) -> Self {
        self.service = Some(service.into());
        self
    }

    /// The first two segments, independent of flavor and service
    ///
    /// Used for display and backup grouping, and for whitelist prefix
    /// eligibility.
    pub fn stack_prefix(&self) -> String {
        format!("/{}/{}", self.region, self.zone)
    }
}

impl fmt::Display for StackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(
                f,
                "/{}/{}/{}/{}",
                self.region, self.zone, self.flavor, service
            ),
            None => write!(f, "/{}/{}/{}", self.region, self.zone, self.flavor),
        }
    }
}

impl FromStr for StackPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.trim().trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [region, zone, flavor] if !region.is_empty() && !zone.is_empty() && !flavor.is_empty() => {
                Ok(StackPath::new(*region, *zone, *flavor))
            }
            [region, zone, flavor, service]
                if !region.is_empty()
                    && !zone.is_empty()
                    && !flavor.is_empty()
                    && !service.is_empty() =>
            {
                Ok(StackPath::new(*region, *zone, *flavor).with_service(*service))
            }
            _ => Err(format!("malformed stack path '{}'", s)),
        }
    }
}

/// Normalize any path string to its first two segments
///
/// Tolerates malformed input by returning the segments that are present.
pub fn format_stack_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .trim()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .take(2)
        .collect();
    format!("/{}", segments.join("/"))
}

/// One live host registered under a stack path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Full stack path this instance registered under
    pub path: String,
    pub ipv4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    /// Advertised weight metadata, raw; may be absent or malformed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
}

impl Instance {
    pub fn new<P: Into<String>, A: Into<String>>(path: P, ipv4: A) -> Self {
        Self {
            path: path.into(),
            ipv4: ipv4.into(),
            ipv6: None,
            weight: None,
        }
    }

    pub fn with_ipv6<S: Into<String>>(mut self, ipv6: S) -> Self {
        self.ipv6 = Some(ipv6.into());
        self
    }

    pub fn with_weight<S: Into<String>>(mut self, weight: S) -> Self {
        self.weight = Some(weight.into());
        self
    }
}

/// Read side of the discovery mechanism
pub trait DiscoveryProvider: Send + Sync {
    /// Live instances currently registered under exactly this path
    fn instances_for(&self, path: &str) -> Vec<Instance>;

    /// Every stack currently known, keyed by full path
    fn all_stacks(&self) -> BTreeMap<String, Vec<Instance>>;

    /// Full paths of every stack currently known, without the instances
    fn stack_paths(&self) -> Vec<String>;
}

/// Discovery state held in memory and swapped atomically on change
///
/// The external coordination store's watch callback replaces the whole map;
/// readers load a consistent generation without blocking.
#[derive(Debug)]
pub struct InMemoryDiscovery {
    stacks: ArcSwap<BTreeMap<String, Vec<Instance>>>,
}

impl InMemoryDiscovery {
    pub fn new() -> Self {
        Self {
            stacks: ArcSwap::from_pointee(BTreeMap::new()),
        }
    }

    /// Register one instance under its path (copy-on-write update)
    pub fn register(&self, instance: Instance) {
        let current = self.stacks.load();
        let mut next = BTreeMap::clone(&current);
        next.entry(instance.path.clone()).or_default().push(instance);
        self.stacks.store(Arc::new(next));
    }

    /// Replace the whole discovery state in one swap
    pub fn replace_all(&self, stacks: BTreeMap<String, Vec<Instance>>) {
        self.stacks.store(Arc::new(stacks));
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.load().is_empty()
    }
}

impl Default for InMemoryDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryProvider for InMemoryDiscovery {
    fn instances_for(&self, path: &str) -> Vec<Instance> {
        self.stacks.load().get(path).cloned().unwrap_or_default()
    }

    fn all_stacks(&self) -> BTreeMap<String, Vec<Instance>> {
        BTreeMap::clone(&self.stacks.load())
    }

    fn stack_paths(&self) -> Vec<String> {
        self.stacks.load().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_path_parse_and_display() {
        let path: StackPath = "/po/poc6/guide".parse().unwrap();
        assert_eq!(path.region, "po");
        assert_eq!(path.zone, "poc6");
        assert_eq!(path.flavor, "guide");
        assert_eq!(path.service, None);
        assert_eq!(path.to_string(), "/po/poc6/guide");

        let with_service: StackPath = "/po/poc6/guide/xreGuide".parse().unwrap();
        assert_eq!(with_service.service.as_deref(), Some("xreGuide"));
        assert_eq!(with_service.to_string(), "/po/poc6/guide/xreGuide");
    }

    #[test]
    fn test_stack_path_rejects_malformed() {
        assert!("".parse::<StackPath>().is_err());
        assert!("/po".parse::<StackPath>().is_err());
        assert!("/po/poc6".parse::<StackPath>().is_err());
        assert!("/po//guide".parse::<StackPath>().is_err());
        assert!("/a/b/c/d/e".parse::<StackPath>().is_err());
    }

    #[test]
    fn test_stack_prefix() {
        let path: StackPath = "/po/poc6/guide/xreGuide".parse().unwrap();
        assert_eq!(path.stack_prefix(), "/po/poc6");
    }

    #[test]
    fn test_format_stack_path_normalizes() {
        assert_eq!(format_stack_path("/po/poc6/guide/xreGuide"), "/po/poc6");
        assert_eq!(format_stack_path("/po/poc6/guide"), "/po/poc6");
        assert_eq!(format_stack_path("po/poc6"), "/po/poc6");
        assert_eq!(format_stack_path("/po"), "/po");
    }

    #[test]
    fn test_in_memory_discovery_register_and_lookup() {
        let discovery = InMemoryDiscovery::new();
        assert!(discovery.is_empty());

        discovery.register(Instance::new("/po/poc6/guide/xreGuide", "10.0.0.1"));
        discovery.register(
            Instance::new("/po/poc6/guide/xreGuide", "10.0.0.2").with_weight("3"),
        );

        let instances = discovery.instances_for("/po/poc6/guide/xreGuide");
        assert_eq!(instances.len(), 2);
        assert!(discovery.instances_for("/po/poc7/guide/xreGuide").is_empty());
        assert_eq!(
            discovery.stack_paths(),
            vec!["/po/poc6/guide/xreGuide".to_string()]
        );
    }

    #[test]
    fn test_replace_all_is_wholesale() {
        let discovery = InMemoryDiscovery::new();
        discovery.register(Instance::new("/po/poc6/old/app", "10.0.0.1"));

        let mut next = BTreeMap::new();
        next.insert(
            "/po/poc6/new/app".to_string(),
            vec![Instance::new("/po/poc6/new/app", "10.0.0.9")],
        );
        discovery.replace_all(next);

        assert!(discovery.instances_for("/po/poc6/old/app").is_empty());
        assert_eq!(discovery.instances_for("/po/poc6/new/app").len(), 1);
    }
}
