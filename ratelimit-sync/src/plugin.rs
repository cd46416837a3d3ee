//! Proxy-side output: the stage-indexed actions of every virtual host and
//! route of a proxy.

use crate::errors::TranslationError;
use crate::model::{sanitize_for_envoy, ApiSnapshot, Proxy, ResourceRef, Settings, VirtualHost};
use crate::reports::{ResourceId, ResourceReports};
use crate::rl_cache::RlCache;
use crate::staged::{HybridTranslator, RouteParams, StagedRateLimits, StagedTranslator, VirtualHostParams};
use crate::translation::{BasicTranslator, CrdTranslator, GlobalTranslator};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRateLimits {
    pub name: String,
    pub rate_limits: StagedRateLimits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHostRateLimits {
    pub name: String,
    pub rate_limits: StagedRateLimits,
    pub routes: Vec<RouteRateLimits>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRateLimits {
    pub proxy: ResourceRef,
    pub virtual_hosts: Vec<VirtualHostRateLimits>,
}

pub struct RateLimitPlugin {
    translator: Box<dyn StagedTranslator>,
}

impl RateLimitPlugin {
    pub fn new(translator: Box<dyn StagedTranslator>) -> Self {
        Self { translator }
    }

    /// The plugin with all staged translators, sharing `cache` for
    /// `RateLimitConfig` lookups.
    pub fn with_cache(cache: Arc<RlCache>) -> Self {
        Self::new(Box::new(HybridTranslator::new(
            Arc::new(BasicTranslator),
            Arc::new(GlobalTranslator),
            Arc::new(CrdTranslator::default()),
            cache,
        )))
    }

    pub fn init(&mut self, settings: &Settings) -> Result<(), TranslationError> {
        self.translator.init(settings)
    }

    /// Translates every proxy of the snapshot. Errors are reported against
    /// the proxy they were found in; the other proxies are still translated.
    pub fn process_snapshot(
        &mut self,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
        reports: &mut ResourceReports,
    ) -> Result<Vec<ProxyRateLimits>, TranslationError> {
        self.init(settings)?;
        Ok(snapshot
            .proxies
            .iter()
            .map(|proxy| self.process_proxy(snapshot, proxy, reports))
            .collect())
    }

    pub fn process_proxy(
        &mut self,
        snapshot: &Arc<ApiSnapshot>,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    ) -> ProxyRateLimits {
        let mut output = ProxyRateLimits {
            proxy: proxy.metadata.resource_ref(),
            virtual_hosts: Vec::new(),
        };

        for listener in &proxy.listeners {
            for http_listener in listener.http_listeners() {
                let params = VirtualHostParams {
                    snapshot,
                    proxy,
                    listener: http_listener,
                };
                for virtual_host in &http_listener.virtual_hosts {
                    let virtual_host = VirtualHost {
                        name: sanitize_for_envoy(&virtual_host.name),
                        ..virtual_host.clone()
                    };
                    output
                        .virtual_hosts
                        .push(self.process_virtual_host(&params, &virtual_host, reports));
                }
            }
        }
        output
    }

    fn process_virtual_host(
        &mut self,
        params: &VirtualHostParams<'_>,
        virtual_host: &VirtualHost,
        reports: &mut ResourceReports,
    ) -> VirtualHostRateLimits {
        let translated = self
            .translator
            .virtual_host_rate_limits_by_stage(params, virtual_host);
        report_errors(params.proxy, translated.errors.iter(), reports);

        let route_params = RouteParams {
            virtual_host_params: *params,
            virtual_host,
        };
        let routes = virtual_host
            .routes
            .iter()
            .map(|route| {
                let translated = self.translator.route_rate_limits_by_stage(&route_params, route);
                report_errors(params.proxy, translated.errors.iter(), reports);
                RouteRateLimits {
                    name: route.name.clone(),
                    rate_limits: translated.by_stage,
                }
            })
            .collect();

        VirtualHostRateLimits {
            name: virtual_host.name.clone(),
            rate_limits: translated.by_stage,
            routes,
        }
    }
}

fn report_errors<'a>(
    proxy: &Proxy,
    errors: impl Iterator<Item = &'a TranslationError>,
    reports: &mut ResourceReports,
) {
    for err in errors {
        reports.add_error(ResourceId::proxy(proxy), err.clone());
    }
}
