use crate::actions::{Action, RateLimitActions};
use crate::descriptors::{validate_set_descriptors, validate_tree, Descriptor, SetDescriptor};
use crate::errors::TranslationError;

/// Translates the gateway-wide descriptors and inline set actions.
pub trait GlobalRateLimitTranslator: Send + Sync {
    /// Produces the canonical set-descriptor list: every set descriptor is
    /// prefixed with the set-style marker. Tree descriptors are only checked;
    /// one that uses the marker is rejected.
    fn to_set_descriptors(
        &self,
        descriptors: &[Descriptor],
        set_descriptors: &[SetDescriptor],
    ) -> Result<Vec<SetDescriptor>, TranslationError>;

    /// Validates the actions and prefixes every non-empty list of set
    /// actions with the set-style marker action.
    fn to_actions(&self, actions: &[RateLimitActions]) -> Result<Vec<RateLimitActions>, TranslationError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalTranslator;

impl GlobalRateLimitTranslator for GlobalTranslator {
    fn to_set_descriptors(
        &self,
        descriptors: &[Descriptor],
        set_descriptors: &[SetDescriptor],
    ) -> Result<Vec<SetDescriptor>, TranslationError> {
        validate_tree(descriptors)?;

        let prefixed: Vec<SetDescriptor> = set_descriptors
            .iter()
            .cloned()
            .map(SetDescriptor::with_marker_prefix)
            .collect();
        validate_set_descriptors(&prefixed)?;
        Ok(prefixed)
    }

    fn to_actions(&self, actions: &[RateLimitActions]) -> Result<Vec<RateLimitActions>, TranslationError> {
        actions
            .iter()
            .map(|rate_limit_actions| -> Result<RateLimitActions, TranslationError> {
                rate_limit_actions
                    .actions
                    .iter()
                    .chain(rate_limit_actions.set_actions.iter())
                    .try_for_each(Action::validate)?;

                let mut set_actions = rate_limit_actions.set_actions.clone();
                let needs_marker = set_actions
                    .first()
                    .map_or(false, |first| !first.is_set_descriptor_marker());
                if needs_marker {
                    set_actions.insert(0, Action::set_descriptor_marker());
                }

                Ok(RateLimitActions::new(rate_limit_actions.actions.clone(), set_actions))
            })
            .collect()
    }
}
