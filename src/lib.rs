/// Desvio - Redirection decision engine for hierarchical service stacks
///
/// Desvio answers one question per client request: which host, or which URL
/// parameters, should this client be sent to. Three subsystems cooperate:
/// 1. Rules: a compiled expression tree evaluated against request attributes
/// 2. Balancer: weighted random selection over discovered instances
/// 3. Backup: last-known-good persistence so decisions survive restarts and
///    outages of the external coordination store
pub mod backup;
pub mod balancer;
pub mod config;
pub mod engine;
pub mod error;
pub mod lists;
pub mod metrics;
pub mod rules;
pub mod traffic;

pub use backup::{BackupEntity, BackupRegistry, BackupStore, StackSnapshot};
pub use balancer::{Balancer, DiscoveryProvider, FilterMode, InMemoryDiscovery, Instance};
pub use config::Config;
pub use engine::Redirector;
pub use error::{DesvioError, DesvioResult};
pub use lists::{NamespacedList, NamespacedListRepository};
pub use metrics::{CountingMetrics, MetricsSink, NoopMetrics};
pub use rules::{Context, DecisionModel, Destination, UrlDecisionModel, UrlParams};
pub use traffic::{calculate_adjusted_traffic, calculate_adjusted_weights};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const RULES: &str = r#"{
        "rules": [
            {
                "condition": {
                    "op": "and",
                    "conditions": [
                        { "op": "equals", "param": "receiverType", "value": "xi6" },
                        { "op": "inIpRange", "param": "clientAddress", "values": ["76.20.128.0/21"] }
                    ]
                },
                "return": { "server": { "path": "/po/poc6/lab" } }
            },
            {
                "condition": { "op": "equals", "param": "receiverType", "value": "xi6" },
                "return": { "server": { "path": "/po/poc6/xi6" } }
            }
        ],
        "default": { "server": { "path": "/po/poc6/stable" } }
    }"#;

    fn engine_with_stacks(stacks: &[(&str, &str)]) -> Redirector {
        let discovery = Arc::new(InMemoryDiscovery::new());
        for (path, ip) in stacks {
            discovery.register(Instance::new(*path, *ip));
        }
        Redirector::new(
            &Config::default(),
            discovery,
            Arc::new(BackupRegistry::in_memory()),
            Arc::new(NoopMetrics),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_redirect() {
        let engine = engine_with_stacks(&[
            ("/po/poc6/lab/xre", "10.0.0.1"),
            ("/po/poc6/xi6/xre", "10.0.0.2"),
            ("/po/poc6/stable/xre", "10.0.0.3"),
        ]);
        engine.install_rules(RULES).await.unwrap();

        // Lab box: composite condition matches first
        let ctx: Context = [("receiverType", "xi6"), ("clientAddress", "76.20.128.4")]
            .into_iter()
            .collect();
        assert_eq!(
            engine.redirect(&ctx, FilterMode::NoFilter).unwrap().ipv4,
            "10.0.0.1"
        );

        // Same receiver outside the lab range falls to the plain match
        let ctx: Context = [("receiverType", "xi6"), ("clientAddress", "8.8.8.8")]
            .into_iter()
            .collect();
        assert_eq!(
            engine.redirect(&ctx, FilterMode::NoFilter).unwrap().ipv4,
            "10.0.0.2"
        );

        // Different receiver takes the document default
        let ctx: Context = [("receiverType", "xg1")].into_iter().collect();
        assert_eq!(
            engine.redirect(&ctx, FilterMode::NoFilter).unwrap().ipv4,
            "10.0.0.3"
        );
    }

    #[tokio::test]
    async fn test_end_to_end_namespaced_list_rule() {
        let engine = engine_with_stacks(&[
            ("/po/poc6/beta/xre", "10.0.1.1"),
            ("/po/poc6/stable/xre", "10.0.1.2"),
        ]);
        engine
            .install_lists(vec![NamespacedList::new(
                "beta_macs",
                vec!["AA:BB:CC:00:11:22".to_string()],
            )])
            .await;
        engine
            .install_rules(
                r#"{
                    "rules": [{
                        "condition": {
                            "op": "contains", "param": "mac",
                            "namespacedLists": ["beta_macs"]
                        },
                        "return": { "server": { "path": "/po/poc6/beta" } }
                    }],
                    "default": { "server": { "path": "/po/poc6/stable" } }
                }"#,
            )
            .await
            .unwrap();

        let ctx: Context = [("mac", "AA:BB:CC:00:11:22")].into_iter().collect();
        assert_eq!(
            engine.redirect(&ctx, FilterMode::NoFilter).unwrap().ipv4,
            "10.0.1.1"
        );

        let ctx: Context = [("mac", "FF:FF:FF:FF:FF:FF")].into_iter().collect();
        assert_eq!(
            engine.redirect(&ctx, FilterMode::NoFilter).unwrap().ipv4,
            "10.0.1.2"
        );
    }
}
