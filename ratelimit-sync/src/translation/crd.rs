use crate::actions::RateLimitActions;
use crate::descriptors::{validate_tree, RawSpec};
use crate::errors::TranslationError;
use crate::model::RateLimitConfig;
use crate::translation::global::{GlobalRateLimitTranslator, GlobalTranslator};

/// Translates `RateLimitConfig` resources.
pub trait RateLimitConfigTranslator: Send + Sync {
    fn to_descriptors(&self, config: &RateLimitConfig) -> Result<RawSpec, TranslationError>;

    fn to_actions(&self, config: &RateLimitConfig) -> Result<Vec<RateLimitActions>, TranslationError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrdTranslator {
    global: GlobalTranslator,
}

impl CrdTranslator {
    /// The resource's raw spec, copied through its serialized form so the
    /// result shares nothing with the snapshot it came from.
    fn raw_spec(config: &RateLimitConfig) -> Result<RawSpec, TranslationError> {
        let raw = config
            .spec
            .raw
            .as_ref()
            .ok_or_else(|| TranslationError::MissingConfigType {
                namespace: config.metadata.namespace.clone(),
                name: config.metadata.name.clone(),
            })?;
        let bytes = serde_json::to_vec(raw)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl RateLimitConfigTranslator for CrdTranslator {
    fn to_descriptors(&self, config: &RateLimitConfig) -> Result<RawSpec, TranslationError> {
        let raw = Self::raw_spec(config)?;
        validate_tree(&raw.descriptors)?;
        let set_descriptors = self
            .global
            .to_set_descriptors(&raw.descriptors, &raw.set_descriptors)?;
        let rate_limits = self.global.to_actions(&raw.rate_limits)?;

        Ok(RawSpec {
            descriptors: raw.descriptors,
            set_descriptors,
            rate_limits,
        })
    }

    fn to_actions(&self, config: &RateLimitConfig) -> Result<Vec<RateLimitActions>, TranslationError> {
        let raw = Self::raw_spec(config)?;
        self.global.to_actions(&raw.rate_limits)
    }
}
