use super::{RouteParams, StagedTranslator, TranslatedRateLimits, VirtualHostParams, INGRESS_RATE_LIMIT_STAGE};
use crate::errors::TranslationError;
use crate::model::{HttpListener, IngressRateLimit, Route, Settings, VirtualHost, DEFAULT_AUTH_HEADER};
use crate::translation::BasicRateLimitTranslator;
use std::collections::HashSet;
use std::sync::Arc;

/// Basic limits. Virtual host and route names share one namespace: a name
/// may only carry a basic limit once per pass.
pub struct IngressTranslator {
    translator: Arc<dyn BasicRateLimitTranslator>,
    before_auth: bool,
    auth_header: String,
    names: HashSet<String>,
}

impl IngressTranslator {
    pub fn new(translator: Arc<dyn BasicRateLimitTranslator>) -> Self {
        Self {
            translator,
            before_auth: false,
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            names: HashSet::new(),
        }
    }

    fn translate(
        &mut self,
        name: &str,
        config: Option<&IngressRateLimit>,
        listener: &HttpListener,
    ) -> TranslatedRateLimits {
        let mut translated = TranslatedRateLimits::new();
        let Some(config) = config else {
            return translated;
        };

        if self.before_auth || listener.rate_limit_before_auth() {
            translated.push_error(TranslationError::AuthOrderingConflict);
            return translated;
        }
        if name.is_empty() {
            translated.push_error(TranslationError::MissingName);
            return translated;
        }
        if !self.names.insert(name.to_string()) {
            translated.push_error(TranslationError::DuplicateName(name.to_string()));
            return translated;
        }

        if let Err(err) = self.translator.generate_server_config(name, config) {
            translated.push_error(err);
            return translated;
        }
        translated.add(
            INGRESS_RATE_LIMIT_STAGE,
            self.translator
                .generate_resource_config(name, &self.auth_header, INGRESS_RATE_LIMIT_STAGE),
        );
        translated
    }
}

impl StagedTranslator for IngressTranslator {
    fn init(&mut self, settings: &Settings) -> Result<(), TranslationError> {
        self.before_auth = settings.rate_limit_before_auth();
        self.auth_header = settings.auth_user_id_header().to_string();
        self.names.clear();
        Ok(())
    }

    fn virtual_host_rate_limits_by_stage(
        &mut self,
        params: &VirtualHostParams<'_>,
        virtual_host: &VirtualHost,
    ) -> TranslatedRateLimits {
        self.translate(
            &virtual_host.name,
            virtual_host.options.ratelimit_basic.as_ref(),
            params.listener,
        )
    }

    fn route_rate_limits_by_stage(&mut self, params: &RouteParams<'_>, route: &Route) -> TranslatedRateLimits {
        self.translate(
            &route.name,
            route.options.ratelimit_basic.as_ref(),
            params.virtual_host_params.listener,
        )
    }
}
