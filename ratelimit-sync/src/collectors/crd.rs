use super::{ConfigCollector, CRD_DOMAIN};
use crate::descriptors::{RawSpec, XdsRateLimitConfig};
use crate::errors::{ErrorList, TranslationError};
use crate::model::{ApiSnapshot, HttpListener, Proxy, RateLimitOptions, ResourceRef, Route, VirtualHost};
use crate::reports::{ResourceId, ResourceReports};
use crate::rl_cache::RlCache;
use crate::translation::RateLimitConfigTranslator;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collects the descriptors of every referenced `RateLimitConfig`.
///
/// Each resource is resolved and translated once per pass, however many
/// virtual hosts and routes point at it. A failed translation is remembered
/// too and reported again against every proxy that references it.
pub struct CrdCollector {
    translator: Arc<dyn RateLimitConfigTranslator>,
    cache: Arc<RlCache>,
    snapshot: Arc<ApiSnapshot>,
    translated: BTreeMap<ResourceRef, Result<RawSpec, TranslationError>>,
}

impl CrdCollector {
    pub fn new(
        translator: Arc<dyn RateLimitConfigTranslator>,
        cache: Arc<RlCache>,
        snapshot: Arc<ApiSnapshot>,
    ) -> Self {
        Self {
            translator,
            cache,
            snapshot,
            translated: BTreeMap::new(),
        }
    }

    fn collect(&mut self, options: &RateLimitOptions, proxy: &Proxy, reports: &mut ResourceReports) {
        for reference in options.config_refs() {
            if !self.translated.contains_key(reference) {
                let result = self.translate(reference, reports);
                self.translated.insert(reference.clone(), result);
            }
            if let Some(Err(err)) = self.translated.get(reference) {
                reports.add_error(ResourceId::proxy(proxy), err.clone());
            }
        }
    }

    fn translate(&self, reference: &ResourceRef, reports: &mut ResourceReports) -> Result<RawSpec, TranslationError> {
        let config = self
            .cache
            .find_rate_limit(&self.snapshot, &reference.namespace, &reference.name)
            .map_err(|_| TranslationError::config_not_found(&reference.namespace, &reference.name))?;

        self.translator.to_descriptors(&config).map_err(|err| {
            debug!("RateLimitConfig {} failed to translate: {}", reference, err);
            reports.add_error(ResourceId::rate_limit_config(reference.clone()), err.clone());
            TranslationError::referenced_config(err, &reference.namespace, &reference.name)
        })
    }
}

impl ConfigCollector for CrdCollector {
    fn process_virtual_host(
        &mut self,
        virtual_host: &VirtualHost,
        _listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    ) {
        self.collect(&virtual_host.options, proxy, reports);
    }

    fn process_route(
        &mut self,
        route: &Route,
        _virtual_host: &VirtualHost,
        _listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    ) {
        self.collect(&route.options, proxy, reports);
    }

    fn to_xds_configuration(&self) -> Result<XdsRateLimitConfig, ErrorList<TranslationError>> {
        let mut config = XdsRateLimitConfig::new(CRD_DOMAIN);
        for spec in self.translated.values().filter_map(|result| result.as_ref().ok()) {
            config.descriptors.extend(spec.descriptors.iter().cloned());
            config.set_descriptors.extend(spec.set_descriptors.iter().cloned());
        }
        Ok(config)
    }
}
