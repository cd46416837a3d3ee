//! Config collectors accumulate the server-side descriptors of one domain
//! while a sync pass walks the proxies.
//!
//! A collector is built fresh for every pass by a [`CollectorFactory`]. The
//! walk never stops on a bad virtual host or route: errors go to the
//! resource reports and the collector moves on.

use crate::descriptors::XdsRateLimitConfig;
use crate::errors::{CollectorError, ErrorList, TranslationError};
use crate::model::{ApiSnapshot, HttpListener, Proxy, Route, Settings, VirtualHost};
use crate::reports::ResourceReports;
use crate::rl_cache::RlCache;
use crate::translation::{
    BasicRateLimitTranslator, BasicTranslator, CrdTranslator, GlobalRateLimitTranslator, GlobalTranslator,
    RateLimitConfigTranslator,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod basic;
mod crd;
mod global;

pub use basic::BasicCollector;
pub use crd::CrdCollector;
pub use global::GlobalCollector;

pub const INGRESS_DOMAIN: &str = "ingress";
pub const CRD_DOMAIN: &str = "crd";
pub const CUSTOM_DOMAIN: &str = "custom";

/// Every call carries the HTTP listener the virtual host was found in, since
/// a listener can override gateway-wide settings.
pub trait ConfigCollector {
    fn process_virtual_host(
        &mut self,
        virtual_host: &VirtualHost,
        listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    );

    fn process_route(
        &mut self,
        route: &Route,
        virtual_host: &VirtualHost,
        listener: &HttpListener,
        proxy: &Proxy,
        reports: &mut ResourceReports,
    );

    /// The domain collected so far. Calling it again yields the same config.
    fn to_xds_configuration(&self) -> Result<XdsRateLimitConfig, ErrorList<TranslationError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectorType {
    Basic,
    Crd,
    Global,
}

impl CollectorType {
    pub const ALL: [CollectorType; 3] = [CollectorType::Basic, CollectorType::Crd, CollectorType::Global];

    pub fn domain(&self) -> &'static str {
        match self {
            CollectorType::Basic => INGRESS_DOMAIN,
            CollectorType::Crd => CRD_DOMAIN,
            CollectorType::Global => CUSTOM_DOMAIN,
        }
    }
}

impl FromStr for CollectorType {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" | "ingress" => Ok(CollectorType::Basic),
            "crd" => Ok(CollectorType::Crd),
            "global" | "custom" => Ok(CollectorType::Global),
            _ => Err(CollectorError::UnknownCollectorType(s.to_string())),
        }
    }
}

impl fmt::Display for CollectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectorType::Basic => "basic",
            CollectorType::Crd => "crd",
            CollectorType::Global => "global",
        };
        f.write_str(name)
    }
}

pub trait CollectorFactory: Send + Sync {
    fn make_instance(
        &self,
        collector_type: CollectorType,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
    ) -> Result<Box<dyn ConfigCollector>, CollectorError>;
}

pub struct DefaultCollectorFactory {
    basic: Arc<dyn BasicRateLimitTranslator>,
    global: Arc<dyn GlobalRateLimitTranslator>,
    crd: Arc<dyn RateLimitConfigTranslator>,
    cache: Arc<RlCache>,
}

impl DefaultCollectorFactory {
    pub fn new(cache: Arc<RlCache>) -> Self {
        Self::with_translators(
            Arc::new(BasicTranslator),
            Arc::new(GlobalTranslator),
            Arc::new(CrdTranslator::default()),
            cache,
        )
    }

    pub fn with_translators(
        basic: Arc<dyn BasicRateLimitTranslator>,
        global: Arc<dyn GlobalRateLimitTranslator>,
        crd: Arc<dyn RateLimitConfigTranslator>,
        cache: Arc<RlCache>,
    ) -> Self {
        Self {
            basic,
            global,
            crd,
            cache,
        }
    }
}

impl CollectorFactory for DefaultCollectorFactory {
    fn make_instance(
        &self,
        collector_type: CollectorType,
        snapshot: &Arc<ApiSnapshot>,
        settings: &Settings,
    ) -> Result<Box<dyn ConfigCollector>, CollectorError> {
        let collector: Box<dyn ConfigCollector> = match collector_type {
            CollectorType::Basic => Box::new(BasicCollector::new(self.basic.clone(), settings)),
            CollectorType::Crd => Box::new(CrdCollector::new(
                self.crd.clone(),
                self.cache.clone(),
                snapshot.clone(),
            )),
            CollectorType::Global => Box::new(GlobalCollector::new(self.global.clone(), settings)),
        };
        Ok(collector)
    }
}
