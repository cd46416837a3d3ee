//! One sync pass: collect every domain, validate it, version it and publish
//! it to the snapshot cache.

use crate::collectors::{CollectorFactory, CollectorType, ConfigCollector};
use crate::descriptors::XdsRateLimitConfig;
use crate::errors::{ErrorList, SyncError};
use crate::metrics::MetricsSink;
use crate::model::{sanitize_for_envoy, ApiSnapshot, Settings, VirtualHost};
use crate::reports::{Reporter, ResourceReports};
use crate::snapshot::{GenericSnapshot, Resource, Resources, SnapshotCache, RATE_LIMIT_ROLE};
use crate::xds::{hash_configs, RATE_LIMIT_CONFIG_TYPE_URL};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Published { version: String },
    Unchanged { version: String },
}

impl SyncOutcome {
    pub fn version(&self) -> &str {
        match self {
            SyncOutcome::Published { version } | SyncOutcome::Unchanged { version } => version,
        }
    }
}

/// Hands the reports to the reporter when dropped, so they are written
/// whichever way the pass ends.
struct ReportGuard<'a> {
    reports: &'a mut ResourceReports,
    reporter: &'a dyn Reporter,
}

impl Deref for ReportGuard<'_> {
    type Target = ResourceReports;

    fn deref(&self) -> &Self::Target {
        &*self.reports
    }
}

impl DerefMut for ReportGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.reports
    }
}

impl Drop for ReportGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.reporter.write_reports(&*self.reports) {
            error!("Failed writing rate limit reports: {}", err);
        }
    }
}

pub struct RateLimitSyncer {
    factory: Arc<dyn CollectorFactory>,
    reporter: Arc<dyn Reporter>,
    metrics: Arc<dyn MetricsSink>,
    collector_types: Vec<CollectorType>,
}

impl RateLimitSyncer {
    pub fn new(
        factory: Arc<dyn CollectorFactory>,
        reporter: Arc<dyn Reporter>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            factory,
            reporter,
            metrics,
            collector_types: CollectorType::ALL.to_vec(),
        }
    }

    pub fn with_collectors(mut self, collector_types: Vec<CollectorType>) -> Self {
        self.collector_types = collector_types;
        self
    }

    pub fn collector_types(&self) -> &[CollectorType] {
        &self.collector_types
    }

    /// Runs one pass over `snapshot`.
    ///
    /// Every proxy and `RateLimitConfig` ends up in `reports`, accepted or
    /// with its errors. Any error fails the pass and nothing is published, so
    /// the last good snapshot stays in the cache. A pass whose content did not
    /// change since the last publication does not publish again.
    pub fn sync(
        &self,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
        cache: &dyn SnapshotCache,
        reports: &mut ResourceReports,
    ) -> Result<SyncOutcome, ErrorList<SyncError>> {
        self.run(snapshot, settings, cache, reports, None)
    }

    /// Like [`RateLimitSyncer::sync`], with the reports of a proxy-side
    /// translation of the same snapshot merged in before the pass is judged.
    /// Their errors fail the pass and reach the reporter like the collectors'
    /// own; errors both sides found are not counted twice.
    pub fn sync_with_reports(
        &self,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
        cache: &dyn SnapshotCache,
        reports: &mut ResourceReports,
        proxy_reports: &ResourceReports,
    ) -> Result<SyncOutcome, ErrorList<SyncError>> {
        self.run(snapshot, settings, cache, reports, Some(proxy_reports))
    }

    fn run(
        &self,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
        cache: &dyn SnapshotCache,
        reports: &mut ResourceReports,
        proxy_reports: Option<&ResourceReports>,
    ) -> Result<SyncOutcome, ErrorList<SyncError>> {
        debug!("Syncing rate limit config for snapshot {}", snapshot.hash());

        let mut reports = ReportGuard {
            reports,
            reporter: self.reporter.as_ref(),
        };
        reports.accept_proxies(&snapshot.proxies);
        reports.accept_rate_limit_configs(&snapshot.ratelimit_configs);

        let result = self
            .build_snapshot(snapshot, settings, &mut reports, proxy_reports)
            .and_then(|(version, generic)| self.publish(cache, version, generic).map_err(ErrorList::from));

        match &result {
            Ok(SyncOutcome::Published { version }) => {
                info!("Published rate limit config version {}", version);
            }
            Ok(SyncOutcome::Unchanged { version }) => {
                debug!("Rate limit config version {} is already published", version);
            }
            Err(errors) => {
                warn!("Rate limit sync failed: {}", errors);
            }
        }
        self.metrics.set_connected(RATE_LIMIT_ROLE, result.is_ok());
        result
    }

    fn build_snapshot(
        &self,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
        reports: &mut ResourceReports,
        proxy_reports: Option<&ResourceReports>,
    ) -> Result<(String, GenericSnapshot), ErrorList<SyncError>> {
        let mut errors: ErrorList<SyncError> = ErrorList::new();

        let mut collectors: Vec<Box<dyn ConfigCollector>> = Vec::with_capacity(self.collector_types.len());
        for collector_type in &self.collector_types {
            match self.factory.make_instance(*collector_type, snapshot, settings) {
                Ok(collector) => collectors.push(collector),
                Err(err) => errors.push(err),
            }
        }

        for proxy in &snapshot.proxies {
            for listener in &proxy.listeners {
                for http_listener in listener.http_listeners() {
                    for virtual_host in &http_listener.virtual_hosts {
                        let virtual_host = VirtualHost {
                            name: sanitize_for_envoy(&virtual_host.name),
                            ..virtual_host.clone()
                        };
                        for collector in collectors.iter_mut() {
                            collector.process_virtual_host(&virtual_host, http_listener, proxy, reports);
                            for route in &virtual_host.routes {
                                collector.process_route(route, &virtual_host, http_listener, proxy, reports);
                            }
                        }
                    }
                }
            }
        }

        let mut configs: Vec<XdsRateLimitConfig> = Vec::with_capacity(collectors.len());
        for collector in &collectors {
            match collector.to_xds_configuration() {
                Ok(config) => configs.push(config),
                Err(translation_errors) => errors.append(translation_errors),
            }
        }

        for config in &configs {
            if let Err(err) = config.validate() {
                errors.push(SyncError::Validation {
                    domain: config.domain.clone(),
                    reason: err.to_string(),
                });
            }
        }

        if let Some(proxy_reports) = proxy_reports {
            reports.merge(proxy_reports);
        }
        errors.extend(reports.errors());
        errors.into_result(())?;

        let version = hash_configs(&configs);
        let resources = configs
            .iter()
            .map(|config| Resource::new(config.domain.clone(), config.to_any()));
        let generic = GenericSnapshot::new().with_resources(
            RATE_LIMIT_CONFIG_TYPE_URL,
            Resources::new(version.clone(), resources),
        );
        generic.consistent().map_err(SyncError::from)?;
        Ok((version, generic))
    }

    fn publish(
        &self,
        cache: &dyn SnapshotCache,
        version: String,
        generic: GenericSnapshot,
    ) -> Result<SyncOutcome, SyncError> {
        let published = cache
            .get_snapshot(RATE_LIMIT_ROLE)
            .and_then(|current| current.version(RATE_LIMIT_CONFIG_TYPE_URL).map(str::to_string));
        if published.as_deref() == Some(version.as_str()) {
            return Ok(SyncOutcome::Unchanged { version });
        }

        cache
            .set_snapshot(RATE_LIMIT_ROLE, generic)
            .map_err(|err| SyncError::Publish(err.to_string()))?;
        Ok(SyncOutcome::Published { version })
    }
}
