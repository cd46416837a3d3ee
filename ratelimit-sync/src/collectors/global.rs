use super::{ConfigCollector, CUSTOM_DOMAIN};
use crate::descriptors::XdsRateLimitConfig;
use crate::errors::{ErrorList, TranslationError};
use crate::model::{HttpListener, Proxy, Route, ServiceSettings, Settings, VirtualHost};
use crate::reports::ResourceReports;
use crate::translation::GlobalRateLimitTranslator;
use std::sync::Arc;

/// The descriptors configured gateway-wide in the settings. Nothing is
/// collected from the proxies.
pub struct GlobalCollector {
    translator: Arc<dyn GlobalRateLimitTranslator>,
    service_settings: ServiceSettings,
}

impl GlobalCollector {
    pub fn new(translator: Arc<dyn GlobalRateLimitTranslator>, settings: &Settings) -> Self {
        Self {
            translator,
            service_settings: settings.ratelimit.clone().unwrap_or_default(),
        }
    }
}

impl ConfigCollector for GlobalCollector {
    fn process_virtual_host(
        &mut self,
        _virtual_host: &VirtualHost,
        _listener: &HttpListener,
        _proxy: &Proxy,
        _reports: &mut ResourceReports,
    ) {
    }

    fn process_route(
        &mut self,
        _route: &Route,
        _virtual_host: &VirtualHost,
        _listener: &HttpListener,
        _proxy: &Proxy,
        _reports: &mut ResourceReports,
    ) {
    }

    fn to_xds_configuration(&self) -> Result<XdsRateLimitConfig, ErrorList<TranslationError>> {
        let set_descriptors = self.translator.to_set_descriptors(
            &self.service_settings.descriptors,
            &self.service_settings.set_descriptors,
        )?;

        let mut config = XdsRateLimitConfig::new(CUSTOM_DOMAIN);
        config.descriptors = self.service_settings.descriptors.clone();
        config.set_descriptors = set_descriptors;
        Ok(config)
    }
}
