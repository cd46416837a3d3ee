use super::{
    pick_stage, route_rate_limits, RouteParams, StagedTranslator, TranslatedRateLimits, VirtualHostParams,
    SET_ACTION_RATE_LIMIT_STAGE, SET_ACTION_RATE_LIMIT_STAGE_BEFORE_AUTH,
};
use crate::errors::TranslationError;
use crate::model::{HttpListener, RateLimitOptions, Route, Settings, VirtualHost};
use crate::translation::GlobalRateLimitTranslator;
use std::sync::Arc;

/// Inline set actions of virtual hosts and routes. Tree actions are left to
/// the rate-limit filter configuration and produce nothing here.
pub struct SetActionTranslator {
    translator: Arc<dyn GlobalRateLimitTranslator>,
    before_auth: bool,
}

impl SetActionTranslator {
    pub fn new(translator: Arc<dyn GlobalRateLimitTranslator>) -> Self {
        Self {
            translator,
            before_auth: false,
        }
    }

    fn translate(&self, listener: &HttpListener, options: &RateLimitOptions) -> TranslatedRateLimits {
        let undecided = pick_stage(
            self.before_auth,
            listener,
            SET_ACTION_RATE_LIMIT_STAGE_BEFORE_AUTH,
            SET_ACTION_RATE_LIMIT_STAGE,
        );
        let buckets = [
            (SET_ACTION_RATE_LIMIT_STAGE_BEFORE_AUTH, &options.ratelimit_early),
            (SET_ACTION_RATE_LIMIT_STAGE, &options.ratelimit_regular),
            (undecided, &options.ratelimit),
        ];

        let mut translated = TranslatedRateLimits::new();
        for (stage, actions) in buckets {
            if actions.is_empty() {
                continue;
            }
            match self.translator.to_actions(actions) {
                Ok(actions) => translated.add(stage, route_rate_limits(stage, &actions, false)),
                Err(err) => translated.push_error(err),
            }
        }
        translated
    }
}

impl StagedTranslator for SetActionTranslator {
    fn init(&mut self, settings: &Settings) -> Result<(), TranslationError> {
        self.before_auth = settings.rate_limit_before_auth();
        Ok(())
    }

    fn virtual_host_rate_limits_by_stage(
        &mut self,
        params: &VirtualHostParams<'_>,
        virtual_host: &VirtualHost,
    ) -> TranslatedRateLimits {
        self.translate(params.listener, &virtual_host.options)
    }

    fn route_rate_limits_by_stage(&mut self, params: &RouteParams<'_>, route: &Route) -> TranslatedRateLimits {
        self.translate(params.virtual_host_params.listener, &route.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, RateLimitActions, RouteRateLimit};
    use crate::model::{ApiSnapshot, Proxy, RateLimitServerSettings};
    use crate::staged::StagedRateLimits;
    use crate::translation::GlobalTranslator;

    fn route() -> Route {
        Route {
            name: "r".to_string(),
            options: RateLimitOptions {
                ratelimit: vec![RateLimitActions::new(
                    vec![Action::generic_key("tree-only")],
                    vec![Action::request_headers("x-type", "type")],
                )],
                ratelimit_regular: vec![RateLimitActions::new(vec![Action::generic_key("tree-only")], vec![])],
                ..Default::default()
            },
        }
    }

    #[test]
    fn only_set_actions_are_emitted() {
        let snapshot = Arc::new(ApiSnapshot::default());
        let proxy = Proxy::default();
        let listener = HttpListener::default();
        let vhost = VirtualHost::default();
        let params = RouteParams {
            virtual_host_params: VirtualHostParams {
                snapshot: &snapshot,
                proxy: &proxy,
                listener: &listener,
            },
            virtual_host: &vhost,
        };
        let mut translator = SetActionTranslator::new(Arc::new(GlobalTranslator));
        translator.init(&Settings::default()).unwrap();

        let translated = translator.route_rate_limits_by_stage(&params, &route());

        assert!(translated.errors.is_empty());
        assert_eq!(
            translated.by_stage,
            StagedRateLimits::from([(
                SET_ACTION_RATE_LIMIT_STAGE,
                vec![RouteRateLimit::new(
                    SET_ACTION_RATE_LIMIT_STAGE,
                    vec![Action::set_descriptor_marker(), Action::request_headers("x-type", "type")]
                )]
            )])
        );
    }

    #[test]
    fn global_before_auth_is_captured_on_init() {
        let settings = Settings {
            ratelimit_server: Some(RateLimitServerSettings {
                rate_limit_before_auth: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let snapshot = Arc::new(ApiSnapshot::default());
        let proxy = Proxy::default();
        let listener = HttpListener::default();
        let vhost = VirtualHost::default();
        let params = RouteParams {
            virtual_host_params: VirtualHostParams {
                snapshot: &snapshot,
                proxy: &proxy,
                listener: &listener,
            },
            virtual_host: &vhost,
        };
        let mut translator = SetActionTranslator::new(Arc::new(GlobalTranslator));
        translator.init(&settings).unwrap();

        let translated = translator.route_rate_limits_by_stage(&params, &route());

        assert!(translated
            .by_stage
            .contains_key(&SET_ACTION_RATE_LIMIT_STAGE_BEFORE_AUTH));
        assert!(!translated.by_stage.contains_key(&SET_ACTION_RATE_LIMIT_STAGE));
    }
}
