use criterion::{black_box, criterion_group, criterion_main, Criterion};
use desvio::balancer::{Balancer, FilterMode, InMemoryDiscovery, Instance, InstanceWeigher};
use desvio::lists::NamespacedListRepository;
use desvio::metrics::NoopMetrics;
use desvio::rules::{Context, DecisionModel};
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
            "condition": { "op": "contains", "param": "model", "values": ["xg1v3", "xg1v4", "xi5"] },
            "return": { "server": { "path": "/po/poc6/legacy" } }
        },
        {
            "condition": {
                "op": "greaterOrEqual",
                "param": "version",
                "value": "2.10.0",
                "compare": "version"
            },
            "return": { "server": { "path": "/po/poc6/current" } }
        }
    ],
    "default": { "server": { "path": "/po/poc6/stable" } }
}"#;

fn rule_evaluation(c: &mut Criterion) {
    let model = DecisionModel::from_json(RULES).unwrap();
    let lists = NamespacedListRepository::new();

    let matching: Context = [
        ("receiverType", "xi6"),
        ("clientAddress", "76.20.128.4"),
        ("version", "2.11.3"),
    ]
    .into_iter()
    .collect();

    let falling_through: Context = [
        ("receiverType", "xg2"),
        ("clientAddress", "8.8.8.8"),
        ("version", "1.0.0"),
    ]
    .into_iter()
    .collect();

    c.bench_function("execute_first_rule_match", |b| {
        b.iter(|| black_box(model.execute(black_box(&matching), &lists)))
    });

    c.bench_function("execute_default_fallthrough", |b| {
        b.iter(|| black_box(model.execute(black_box(&falling_through), &lists)))
    });
}

fn instance_selection(c: &mut Criterion) {
    let discovery = Arc::new(InMemoryDiscovery::new());
    for i in 0..32 {
        discovery.register(
            Instance::new("/po/poc6/stable/xre", format!("10.0.0.{}", i))
                .with_weight(((i % 8) + 1).to_string()),
        );
    }
    let balancer = Balancer::new(
        discovery,
        InstanceWeigher::new(5, 100),
        "xre".to_string(),
        Arc::new(NoopMetrics),
    );

    c.bench_function("resolve_weighted_pick_32_hosts", |b| {
        b.iter(|| black_box(balancer.resolve(black_box("/po/poc6/stable"), FilterMode::NoFilter)))
    });
}

criterion_group!(benches, rule_evaluation, instance_selection);
criterion_main!(benches);
