use criterion::{black_box, criterion_group, criterion_main, Bencher, BenchmarkId, Criterion};
use rand::seq::SliceRandom;
use rand::SeedableRng;

use ratelimit_sync::descriptors::{Descriptor, RateLimit, RawSpec, Unit};
use ratelimit_sync::errors::SyncError;
use ratelimit_sync::metrics::MetricsSink;
use ratelimit_sync::model::{
    ApiSnapshot, HttpListener, IngressRateLimit, Listener, ListenerType, Metadata, Proxy, RateLimitConfig,
    RateLimitOptions, ResourceRef, Route, Settings, VirtualHost,
};
use ratelimit_sync::reports::{Reporter, ResourceReports};
use ratelimit_sync::snapshot::InMemorySnapshotCache;
use ratelimit_sync::{DefaultCollectorFactory, RateLimitPlugin, RateLimitSyncer, RlCache};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const SEED: u64 = 42;

criterion_group!(benches, bench_sync, bench_plugin);
criterion_main!(benches);

#[derive(Debug, Clone)]
struct TestScenario {
    n_proxies: u32,
    n_virtual_hosts_per_proxy: u32,
    n_routes_per_virtual_host: u32,
    n_configs: u32,
}

const TEST_SCENARIOS: &[&TestScenario] = &[
    &TestScenario {
        n_proxies: 1,
        n_virtual_hosts_per_proxy: 1,
        n_routes_per_virtual_host: 1,
        n_configs: 1,
    },
    &TestScenario {
        n_proxies: 10,
        n_virtual_hosts_per_proxy: 10,
        n_routes_per_virtual_host: 10,
        n_configs: 10,
    },
    &TestScenario {
        n_proxies: 10,
        n_virtual_hosts_per_proxy: 50,
        n_routes_per_virtual_host: 10,
        n_configs: 100,
    },
];

impl Display for TestScenario {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} proxies with {} virtual hosts each with {} routes over {} configs",
            self.n_proxies, self.n_virtual_hosts_per_proxy, self.n_routes_per_virtual_host, self.n_configs
        )
    }
}

struct NoReports;

impl Reporter for NoReports {
    fn write_reports(&self, _reports: &ResourceReports) -> Result<(), SyncError> {
        Ok(())
    }
}

struct NoMetrics;

impl MetricsSink for NoMetrics {
    fn set_connected(&self, _role: &str, _connected: bool) {}
}

fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sync");
    for scenario in TEST_SCENARIOS {
        group.bench_with_input(
            BenchmarkId::new("sync", scenario),
            scenario,
            |b: &mut Bencher, test_scenario: &&TestScenario| {
                let snapshot = Arc::new(generate_snapshot(test_scenario));
                let syncer = RateLimitSyncer::new(
                    Arc::new(DefaultCollectorFactory::new(Arc::new(RlCache::new()))),
                    Arc::new(NoReports),
                    Arc::new(NoMetrics),
                );
                let settings = Settings::default();
                b.iter(|| {
                    // A fresh cache per pass, so every pass publishes
                    let cache = InMemorySnapshotCache::new();
                    let mut reports = ResourceReports::new();
                    black_box(syncer.sync(&snapshot, &settings, &cache, &mut reports)).unwrap();
                })
            },
        );
    }
    group.finish();
}

fn bench_plugin(c: &mut Criterion) {
    let mut group = c.benchmark_group("Plugin");
    for scenario in TEST_SCENARIOS {
        group.bench_with_input(
            BenchmarkId::new("process_snapshot", scenario),
            scenario,
            |b: &mut Bencher, test_scenario: &&TestScenario| {
                let snapshot = Arc::new(generate_snapshot(test_scenario));
                let mut plugin = RateLimitPlugin::with_cache(Arc::new(RlCache::new()));
                let settings = Settings::default();
                b.iter(|| {
                    let mut reports = ResourceReports::new();
                    black_box(plugin.process_snapshot(&snapshot, &settings, &mut reports)).unwrap();
                })
            },
        );
    }
    group.finish();
}

fn generate_snapshot(test_scenario: &TestScenario) -> ApiSnapshot {
    let mut rng = rand::rngs::StdRng::seed_from_u64(SEED);

    let configs: Vec<RateLimitConfig> = (0..test_scenario.n_configs)
        .map(|idx| {
            RateLimitConfig::new(
                "default",
                &format!("config_{idx}"),
                RawSpec {
                    descriptors: vec![Descriptor::new("generic_key")
                        .with_value(format!("config_{idx}"))
                        .with_rate_limit(RateLimit::new(Unit::Minute, 10))],
                    ..Default::default()
                },
            )
        })
        .collect();
    let config_refs: Vec<ResourceRef> = configs
        .iter()
        .map(|config| config.metadata.resource_ref())
        .collect();

    let proxies = (0..test_scenario.n_proxies)
        .map(|proxy_idx| Proxy {
            metadata: Metadata::new("gloo-system", format!("proxy_{proxy_idx}")),
            listeners: vec![Listener {
                name: "listener-::-8080".to_string(),
                listener_type: ListenerType::HttpListener(HttpListener {
                    virtual_hosts: (0..test_scenario.n_virtual_hosts_per_proxy)
                        .map(|vh_idx| VirtualHost {
                            name: format!("gloo-system/vh_{proxy_idx}_{vh_idx}"),
                            domains: vec![format!("vh-{proxy_idx}-{vh_idx}.example.com")],
                            routes: (0..test_scenario.n_routes_per_virtual_host)
                                .map(|route_idx| Route {
                                    name: format!("route_{route_idx}"),
                                    options: RateLimitOptions {
                                        rate_limit_configs: config_refs
                                            .choose(&mut rng)
                                            .cloned()
                                            .into_iter()
                                            .collect(),
                                        ..Default::default()
                                    },
                                })
                                .collect(),
                            options: RateLimitOptions {
                                ratelimit_basic: Some(IngressRateLimit {
                                    authorized_limits: Some(RateLimit::new(Unit::Second, 100)),
                                    anonymous_limits: Some(RateLimit::new(Unit::Minute, 10)),
                                }),
                                ..Default::default()
                            },
                        })
                        .collect(),
                    ..Default::default()
                }),
            }],
        })
        .collect();

    ApiSnapshot::new(proxies, configs)
}
