/// Namespaced list repository
///
/// A namespaced list maps a name to a set of string values. Entries may be
/// literal tokens or IPv4/IPv6 CIDR ranges; rules reference lists by name
/// only, so lists can be replaced at runtime without recompiling any rule
/// that mentions them. An unknown list name resolves to the empty set and
/// never to an error.

use arc_swap::ArcSwap;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

/// One named set of values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespacedList {
    pub name: String,
    pub values: Vec<String>,
}

impl NamespacedList {
    pub fn new<S: Into<String>>(name: S, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A compiled list entry: value set plus the IP ranges parsed out of it
#[derive(Debug)]
struct CompiledList {
    values: HashSet<String>,
    ranges: IpRangeSet,
}

/// Repository of namespaced lists, replaced wholesale on reload
///
/// Readers resolve list names at evaluation time (late binding). The backing
/// map is swapped atomically so concurrent evaluations see either the old or
/// the new generation, never a mix.
#[derive(Debug)]
pub struct NamespacedListRepository {
    lists: ArcSwap<HashMap<String, Arc<CompiledList>>>,
}

impl NamespacedListRepository {
    pub fn new() -> Self {
        Self {
            lists: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Replace every list in one atomic swap
    pub fn replace_all(&self, lists: Vec<NamespacedList>) {
        let mut map = HashMap::with_capacity(lists.len());
        for list in lists {
            let ranges = IpRangeSet::parse(list.values.iter().map(String::as_str));
            let compiled = CompiledList {
                values: list.values.into_iter().collect(),
                ranges,
            };
            map.insert(list.name, Arc::new(compiled));
        }
        self.lists.store(Arc::new(map));
    }

    /// Get the values of a list; an absent name yields the empty set
    pub fn get_values(&self, name: &str) -> HashSet<String> {
        self.lists
            .load()
            .get(name)
            .map(|l| l.values.clone())
            .unwrap_or_default()
    }

    /// Membership test against one list's literal values
    pub fn contains_value(&self, name: &str, value: &str) -> bool {
        self.lists
            .load()
            .get(name)
            .map(|l| l.values.contains(value))
            .unwrap_or(false)
    }

    /// IP containment test against one list's parsed ranges
    pub fn matches_ip(&self, name: &str, probe: &str) -> bool {
        self.lists
            .load()
            .get(name)
            .map(|l| l.ranges.matches(probe))
            .unwrap_or(false)
    }

    /// Names of all known lists
    pub fn names(&self) -> Vec<String> {
        self.lists.load().keys().cloned().collect()
    }

    /// Export all lists for backup
    pub fn export(&self) -> Vec<NamespacedList> {
        let mut out: Vec<NamespacedList> = self
            .lists
            .load()
            .iter()
            .map(|(name, list)| {
                let mut values: Vec<String> = list.values.iter().cloned().collect();
                values.sort();
                NamespacedList::new(name.clone(), values)
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

impl Default for NamespacedListRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of IP ranges parsed from list entries
///
/// Entries that parse as CIDR networks, bare addresses, or `start-end`
/// dashed ranges participate; anything else is skipped. IPv4 and IPv6
/// entries only ever match probes of the same family.
#[derive(Debug, Clone, Default)]
pub struct IpRangeSet {
    nets: Vec<IpNet>,
    bounds: Vec<(IpAddr, IpAddr)>,
}

impl IpRangeSet {
    /// Parse range entries, silently skipping non-IP values
    pub fn parse<'a>(entries: impl Iterator<Item = &'a str>) -> Self {
        let mut nets = Vec::new();
        let mut bounds = Vec::new();

        for entry in entries {
            let entry = entry.trim();
            if let Ok(net) = entry.parse::<IpNet>() {
                nets.push(net);
            } else if let Ok(addr) = entry.parse::<IpAddr>() {
                if let Some(net) = host_net(addr) {
                    nets.push(net);
                }
            } else if let Some((lo, hi)) = entry.split_once('-') {
                match (lo.trim().parse::<IpAddr>(), hi.trim().parse::<IpAddr>()) {
                    (Ok(lo), Ok(hi)) if same_family(&lo, &hi) && lo <= hi => {
                        bounds.push((lo, hi));
                    }
                    _ => {}
                }
            }
        }

        Self { nets, bounds }
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty() && self.bounds.is_empty()
    }

    /// True when the address falls inside any range
    pub fn contains_addr(&self, addr: &IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(addr))
            || self
                .bounds
                .iter()
                .any(|(lo, hi)| same_family(lo, addr) && lo <= addr && addr <= hi)
    }

    /// True when the network is wholly contained by any range
    pub fn contains_net(&self, probe: &IpNet) -> bool {
        self.nets.iter().any(|net| net.contains(probe))
            || self.bounds.iter().any(|(lo, hi)| {
                same_family(lo, &probe.network())
                    && *lo <= probe.network()
                    && probe.broadcast() <= *hi
            })
    }

    /// Parse a probe string as an address or CIDR and test containment
    ///
    /// A malformed probe never matches.
    pub fn matches(&self, probe: &str) -> bool {
        let probe = probe.trim();
        if let Ok(net) = probe.parse::<IpNet>() {
            self.contains_net(&net)
        } else if let Ok(addr) = probe.parse::<IpAddr>() {
            self.contains_addr(&addr)
        } else {
            false
        }
    }
}

fn same_family(a: &IpAddr, b: &IpAddr) -> bool {
    a.is_ipv4() == b.is_ipv4()
}

fn host_net(addr: IpAddr) -> Option<IpNet> {
    match addr {
        IpAddr::V4(v4) => ipnet::Ipv4Net::new(v4, 32).ok().map(IpNet::V4),
        IpAddr::V6(v6) => ipnet::Ipv6Net::new(v6, 128).ok().map(IpNet::V6),
    }
}
