use super::{ConfigCollector, INGRESS_DOMAIN};
use crate::descriptors::{Descriptor, XdsRateLimitConfig};
use crate::errors::{ErrorList, TranslationError};
use crate::model::{HttpListener, IngressRateLimit, Proxy, Route, Settings, VirtualHost};
use crate::reports::{ResourceId, ResourceReports};
use crate::translation::BasicRateLimitTranslator;
use std::collections::HashSet;
use std::sync::Arc;

/// Collects one descriptor tree per virtual host or route carrying a basic
/// limit. The first use of a name wins; later ones are reported. Basic limits
/// conflict with rate limiting before auth, whether the gateway settings or
/// the enclosing listener ask for it.
pub struct BasicCollector {
    translator: Arc<dyn BasicRateLimitTranslator>,
    before_auth: bool,
    names: HashSet<String>,
    descriptors: Vec<Descriptor>,
}

impl BasicCollector {
    pub fn new(translator: Arc<dyn BasicRateLimitTranslator>, settings: &Settings) -> Self {
        Self {
            translator,
            before_auth: settings.rate_limit_before_auth(),
            names: HashSet::new(),
            descriptors: Vec::new(),
        }
    }

    fn collect(
        &mut self,
        name: &str,
        config: Option<&IngressRateLimit>,
        listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    ) {
        let Some(config) = config else {
            return;
        };
        if let Err(err) = self.descriptor(name, config, listener) {
            reports.add_error(ResourceId::proxy(proxy), err);
        }
    }

    fn descriptor(
        &mut self,
        name: &str,
        config: &IngressRateLimit,
        listener: &HttpListener,
    ) -> Result<(), TranslationError> {
        if self.before_auth || listener.rate_limit_before_auth() {
            return Err(TranslationError::AuthOrderingConflict);
        }
        if name.is_empty() {
            return Err(TranslationError::MissingName);
        }
        if !self.names.insert(name.to_string()) {
            return Err(TranslationError::DuplicateName(name.to_string()));
        }

        let descriptor = self.translator.generate_server_config(name, config)?;
        self.descriptors.push(descriptor);
        Ok(())
    }
}

impl ConfigCollector for BasicCollector {
    fn process_virtual_host(
        &mut self,
        virtual_host: &VirtualHost,
        listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    ) {
        self.collect(
            &virtual_host.name,
            virtual_host.options.ratelimit_basic.as_ref(),
            listener,
            proxy,
            reports,
        );
    }

    fn process_route(
        &mut self,
        route: &Route,
        _virtual_host: &VirtualHost,
        listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    ) {
        self.collect(
            &route.name,
            route.options.ratelimit_basic.as_ref(),
            listener,
            proxy,
            reports,
        );
    }

    fn to_xds_configuration(&self) -> Result<XdsRateLimitConfig, ErrorList<TranslationError>> {
        let mut config = XdsRateLimitConfig::new(INGRESS_DOMAIN);
        config.descriptors = self.descriptors.clone();
        Ok(config)
    }
}
