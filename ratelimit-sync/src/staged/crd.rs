use super::{
    pick_stage, route_rate_limits, RouteParams, StagedTranslator, TranslatedRateLimits, VirtualHostParams,
    CRD_RATE_LIMIT_STAGE, CRD_RATE_LIMIT_STAGE_BEFORE_AUTH,
};
use crate::actions::RateLimitActions;
use crate::errors::TranslationError;
use crate::model::{RateLimitOptions, ResourceRef, Route, Settings, VirtualHost};
use crate::rl_cache::RlCache;
use crate::translation::RateLimitConfigTranslator;
use std::sync::Arc;

/// Actions of the `RateLimitConfig` resources referenced by a virtual host or
/// route.
pub struct CrdStagedTranslator {
    translator: Arc<dyn RateLimitConfigTranslator>,
    cache: Arc<RlCache>,
    before_auth: bool,
}

impl CrdStagedTranslator {
    pub fn new(translator: Arc<dyn RateLimitConfigTranslator>, cache: Arc<RlCache>) -> Self {
        Self {
            translator,
            cache,
            before_auth: false,
        }
    }

    fn translate(&self, params: &VirtualHostParams<'_>, options: &RateLimitOptions) -> TranslatedRateLimits {
        let undecided = pick_stage(
            self.before_auth,
            params.listener,
            CRD_RATE_LIMIT_STAGE_BEFORE_AUTH,
            CRD_RATE_LIMIT_STAGE,
        );
        let buckets = [
            (CRD_RATE_LIMIT_STAGE_BEFORE_AUTH, &options.rate_limit_early_configs),
            (CRD_RATE_LIMIT_STAGE, &options.rate_limit_regular_configs),
            (undecided, &options.rate_limit_configs),
        ];

        let mut translated = TranslatedRateLimits::new();
        for (stage, references) in buckets {
            for reference in references {
                match self.actions_for(params, reference) {
                    Ok(actions) => translated.add(stage, route_rate_limits(stage, &actions, true)),
                    Err(err) => translated.push_error(err),
                }
            }
        }
        translated
    }

    fn actions_for(
        &self,
        params: &VirtualHostParams<'_>,
        reference: &ResourceRef,
    ) -> Result<Vec<RateLimitActions>, TranslationError> {
        let config = self
            .cache
            .find_rate_limit(params.snapshot, &reference.namespace, &reference.name)
            .map_err(|_| TranslationError::config_not_found(&reference.namespace, &reference.name))?;
        self.translator
            .to_actions(&config)
            .map_err(|err| TranslationError::referenced_config(err, &reference.namespace, &reference.name))
    }
}

impl StagedTranslator for CrdStagedTranslator {
    fn init(&mut self, settings: &Settings) -> Result<(), TranslationError> {
        self.before_auth = settings.rate_limit_before_auth();
        Ok(())
    }

    fn virtual_host_rate_limits_by_stage(
        &mut self,
        params: &VirtualHostParams<'_>,
        virtual_host: &VirtualHost,
    ) -> TranslatedRateLimits {
        self.translate(params, &virtual_host.options)
    }

    fn route_rate_limits_by_stage(&mut self, params: &RouteParams<'_>, route: &Route) -> TranslatedRateLimits {
        self.translate(&params.virtual_host_params, &route.options)
    }
}
