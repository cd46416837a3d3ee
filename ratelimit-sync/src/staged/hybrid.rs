use super::{
    CrdStagedTranslator, IngressTranslator, RouteParams, SetActionTranslator, StagedRateLimits, StagedTranslator,
    TranslatedRateLimits, VirtualHostParams,
};
use crate::errors::TranslationError;
use crate::model::{Route, Settings, VirtualHost};
use crate::rl_cache::RlCache;
use crate::translation::{BasicRateLimitTranslator, GlobalRateLimitTranslator, RateLimitConfigTranslator};
use std::sync::Arc;

/// Runs every staged translator over the same virtual host or route and
/// merges their stages.
pub struct HybridTranslator {
    translators: Vec<Box<dyn StagedTranslator>>,
}

impl HybridTranslator {
    /// Ingress, `RateLimitConfig` and set-action translators, in that order.
    pub fn new(
        basic: Arc<dyn BasicRateLimitTranslator>,
        global: Arc<dyn GlobalRateLimitTranslator>,
        crd: Arc<dyn RateLimitConfigTranslator>,
        cache: Arc<RlCache>,
    ) -> Self {
        Self::with_translators(vec![
            Box::new(IngressTranslator::new(basic)),
            Box::new(CrdStagedTranslator::new(crd, cache)),
            Box::new(SetActionTranslator::new(global)),
        ])
    }

    pub fn with_translators(translators: Vec<Box<dyn StagedTranslator>>) -> Self {
        Self { translators }
    }
}

fn merge_all(results: impl IntoIterator<Item = TranslatedRateLimits>) -> TranslatedRateLimits {
    let mut merged = TranslatedRateLimits::new();
    for translated in results {
        merge_stage_rate_limits(&mut merged.by_stage, translated.by_stage);
        merged.errors.append(translated.errors);
    }
    merged
}

impl StagedTranslator for HybridTranslator {
    fn init(&mut self, settings: &Settings) -> Result<(), TranslationError> {
        for translator in self.translators.iter_mut() {
            translator.init(settings)?;
        }
        Ok(())
    }

    fn virtual_host_rate_limits_by_stage(
        &mut self,
        params: &VirtualHostParams<'_>,
        virtual_host: &VirtualHost,
    ) -> TranslatedRateLimits {
        let results: Vec<_> = self
            .translators
            .iter_mut()
            .map(|translator| translator.virtual_host_rate_limits_by_stage(params, virtual_host))
            .collect();
        merge_all(results)
    }

    fn route_rate_limits_by_stage(&mut self, params: &RouteParams<'_>, route: &Route) -> TranslatedRateLimits {
        let results: Vec<_> = self
            .translators
            .iter_mut()
            .map(|translator| translator.route_rate_limits_by_stage(params, route))
            .collect();
        merge_all(results)
    }
}

/// Adds `source` to `dest`, stage by stage. Within a stage the entries of
/// `source` go in front of the ones already there.
pub fn merge_stage_rate_limits(dest: &mut StagedRateLimits, source: StagedRateLimits) {
    for (stage, mut rate_limits) in source {
        let existing = dest.entry(stage).or_default();
        rate_limits.append(existing);
        *existing = rate_limits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, RouteRateLimit};
    use crate::model::{ApiSnapshot, HttpListener, Proxy};

    struct Fixed {
        stage: u32,
        value: &'static str,
        error: Option<TranslationError>,
        init_error: Option<TranslationError>,
    }

    impl Fixed {
        fn new(stage: u32, value: &'static str) -> Self {
            Self {
                stage,
                value,
                error: None,
                init_error: None,
            }
        }

        fn translated(&self) -> TranslatedRateLimits {
            let mut translated = TranslatedRateLimits::new();
            translated.add(
                self.stage,
                vec![RouteRateLimit::new(self.stage, vec![Action::generic_key(self.value)])],
            );
            if let Some(err) = &self.error {
                translated.push_error(err.clone());
            }
            translated
        }
    }

    impl StagedTranslator for Fixed {
        fn init(&mut self, _settings: &Settings) -> Result<(), TranslationError> {
            match &self.init_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn virtual_host_rate_limits_by_stage(
            &mut self,
            _params: &VirtualHostParams<'_>,
            _virtual_host: &VirtualHost,
        ) -> TranslatedRateLimits {
            self.translated()
        }

        fn route_rate_limits_by_stage(&mut self, _params: &RouteParams<'_>, _route: &Route) -> TranslatedRateLimits {
            self.translated()
        }
    }

    #[test]
    fn later_translators_go_first_within_a_stage() {
        let snapshot = Arc::new(ApiSnapshot::default());
        let proxy = Proxy::default();
        let listener = HttpListener::default();
        let params = VirtualHostParams {
            snapshot: &snapshot,
            proxy: &proxy,
            listener: &listener,
        };
        let mut failing = Fixed::new(2, "third");
        failing.error = Some(TranslationError::MissingName);
        let mut hybrid = HybridTranslator::with_translators(vec![
            Box::new(Fixed::new(2, "first")),
            Box::new(Fixed::new(1, "second")),
            Box::new(failing),
        ]);

        let translated = hybrid.virtual_host_rate_limits_by_stage(&params, &VirtualHost::default());

        let values: Vec<_> = translated.by_stage[&2]
            .iter()
            .map(|rl| rl.actions[0].clone())
            .collect();
        assert_eq!(values, vec![Action::generic_key("third"), Action::generic_key("first")]);
        assert_eq!(translated.by_stage[&1].len(), 1);
        assert_eq!(translated.errors.len(), 1);
    }

    #[test]
    fn init_stops_at_the_first_error() {
        let mut failing = Fixed::new(0, "a");
        failing.init_error = Some(TranslationError::AuthOrderingConflict);
        let mut hybrid = HybridTranslator::with_translators(vec![Box::new(failing), Box::new(Fixed::new(0, "b"))]);

        assert_eq!(
            hybrid.init(&Settings::default()),
            Err(TranslationError::AuthOrderingConflict)
        );
    }

    #[test]
    fn merge_prepends() {
        let mut dest = StagedRateLimits::from([(1, vec![RouteRateLimit::new(1, vec![Action::remote_address()])])]);
        merge_stage_rate_limits(
            &mut dest,
            StagedRateLimits::from([
                (1, vec![RouteRateLimit::new(1, vec![Action::generic_key("new")])]),
                (3, vec![RouteRateLimit::new(3, vec![Action::generic_key("other")])]),
            ]),
        );

        assert_eq!(
            dest[&1],
            vec![
                RouteRateLimit::new(1, vec![Action::generic_key("new")]),
                RouteRateLimit::new(1, vec![Action::remote_address()]),
            ]
        );
        assert_eq!(dest[&3].len(), 1);
    }
}
