/// Expression evaluation engine
///
/// Turns a rule document into a compiled, immutable decision model and
/// evaluates it against a request context. Two model variants exist: flavor
/// routing resolves to a `Server`/`ServerGroup` destination, URL routing
/// resolves to `UrlParams` through a per-field cascade. Compiled models are
/// replaced wholesale, never mutated, so concurrent readers never block.
pub mod condition;
pub mod document;
pub mod model;

pub use condition::{CompareKind, Condition};
pub use document::{IfBlock, Outcome, RulesDocument, UrlRulesDocument};
pub use model::{DecisionModel, UrlDecisionModel};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request attributes a rule document is evaluated against
#[derive(Debug, Clone, Default)]
pub struct Context {
    params: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one attribute, replacing any previous value
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// "Empty" means absent or present with an empty string
    pub fn is_empty_param(&self, key: &str) -> bool {
        match self.params.get(key) {
            None => true,
            Some(v) => v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A destination descriptor: a stack/flavor path or an explicit URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// Hierarchical path (`/region/zone/flavor[/service]`) or bare flavor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Explicit URL template, used instead of discovery lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Query/context values carried through to the final redirect
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, String>,
}

impl Server {
    pub fn for_path<S: Into<String>>(path: S) -> Self {
        Self {
            path: Some(path.into()),
            url: None,
            query: HashMap::new(),
        }
    }

    pub fn for_url<S: Into<String>>(url: S) -> Self {
        Self {
            path: None,
            url: Some(url.into()),
            query: HashMap::new(),
        }
    }
}

/// A percentage-weighted alternative inside a server group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub percent: f64,
    pub server: Server,
}

/// Ordered weighted alternatives plus one default, for distribution rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroup {
    #[serde(default)]
    pub distributions: Vec<Distribution>,
    pub default: Server,
}

impl ServerGroup {
    /// Pick one server: walk cumulative percentages against a random draw,
    /// falling through to the default
    pub fn select(&self) -> &Server {
        use rand::Rng;
        let draw = rand::thread_rng().gen::<f64>() * 100.0;
        let mut cumulative = 0.0;
        for dist in &self.distributions {
            cumulative += dist.percent;
            if draw < cumulative {
                return &dist.server;
            }
        }
        &self.default
    }
}

/// What a flavor-routing rule resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Destination {
    Server(Server),
    Group(ServerGroup),
}

impl Destination {
    /// The concrete server for this decision (group members drawn by weight)
    pub fn server(&self) -> &Server {
        match self {
            Destination::Server(s) => s,
            Destination::Group(g) => g.select(),
        }
    }
}

/// Protocol/port/urn/IP-version parameters for URL routing
///
/// Each field is independently nullable; absence triggers the next tier of
/// the fallback cascade rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol_version: Option<u8>,
}

impl UrlParams {
    pub fn new(protocol: &str, port: u16, urn: &str, ip_protocol_version: u8) -> Self {
        Self {
            protocol: Some(protocol.to_string()),
            port: Some(port),
            urn: Some(urn.to_string()),
            ip_protocol_version: Some(ip_protocol_version),
        }
    }

    /// Fill fields still unset from the next cascade tier
    pub fn merge_missing_from(&mut self, fallback: &UrlParams) {
        if self.protocol.is_none() {
            self.protocol = fallback.protocol.clone();
        }
        if self.port.is_none() {
            self.port = fallback.port;
        }
        if self.urn.is_none() {
            self.urn = fallback.urn.clone();
        }
        if self.ip_protocol_version.is_none() {
            self.ip_protocol_version = fallback.ip_protocol_version;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.protocol.is_some()
            && self.port.is_some()
            && self.urn.is_some()
            && self.ip_protocol_version.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accessors() {
        let mut ctx = Context::new();
        ctx.set("receiverType", "xi6").set("mac", "AA:BB");

        assert_eq!(ctx.get("receiverType"), Some("xi6"));
        assert_eq!(ctx.get("missing"), None);
        assert_eq!(ctx.len(), 2);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_context_from_iter() {
        let ctx: Context = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(ctx.get("a"), Some("1"));
        assert_eq!(ctx.get("b"), Some("2"));
    }

    #[test]
    fn test_empty_param_shapes() {
        let mut ctx = Context::new();
        ctx.set("blank", "");

        assert!(ctx.is_empty_param("blank"));
        assert!(ctx.is_empty_param("absent"));

        ctx.set("addr", "192.168.201.5");
        assert!(!ctx.is_empty_param("addr"));
    }

    #[test]
    fn test_server_group_default_when_no_distributions() {
        let group = ServerGroup {
            distributions: vec![],
            default: Server::for_path("/po/poc1/stable"),
        };
        assert_eq!(group.select().path.as_deref(), Some("/po/poc1/stable"));
    }

    #[test]
    fn test_server_group_full_distribution_never_defaults() {
        let group = ServerGroup {
            distributions: vec![Distribution {
                percent: 100.0,
                server: Server::for_path("/po/poc1/canary"),
            }],
            default: Server::for_path("/po/poc1/stable"),
        };
        for _ in 0..500 {
            assert_eq!(group.select().path.as_deref(), Some("/po/poc1/canary"));
        }
    }

    #[test]
    fn test_url_params_merge_missing() {
        let mut params = UrlParams {
            urn: Some("guide".to_string()),
            ..Default::default()
        };
        let fallback = UrlParams::new("xres", 10004, "shell", 4);

        params.merge_missing_from(&fallback);
        assert_eq!(params.urn.as_deref(), Some("guide")); // not overwritten
        assert_eq!(params.protocol.as_deref(), Some("xres"));
        assert_eq!(params.port, Some(10004));
        assert_eq!(params.ip_protocol_version, Some(4));
        assert!(params.is_complete());
    }

    #[test]
    fn test_server_serde_shapes() {
        let s = Server::for_path("/po/poc6/guide");
        let json = serde_json::to_string(&s).unwrap();
        // Unset fields stay out of the document
        assert!(!json.contains("url"));
        let back: Server = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
