//! Server-side rate-limit configuration.
//!
//! The rate-limit server evaluates request descriptors against either a
//! [`Descriptor`] tree (a specific path must be under limit) or a list of
//! [`SetDescriptor`]s (every listed dimension must be under limit, in any
//! order). Set descriptors are told apart from trees by a leading
//! `generic_key` entry whose value is [`SET_DESCRIPTOR_UNIQUE_VALUE`]; trees
//! must never use that pair.

use crate::actions::RateLimitActions;
use crate::errors::TranslationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const GENERIC_KEY: &str = "generic_key";
pub const SET_DESCRIPTOR_UNIQUE_VALUE: &str = "solo.setDescriptor.uniqueValue";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    #[default]
    Unknown,
    Second,
    Minute,
    Hour,
    Day,
}

impl Unit {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl From<Unit> for i32 {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Unknown => 0,
            Unit::Second => 1,
            Unit::Minute => 2,
            Unit::Hour => 3,
            Unit::Day => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub requests_per_unit: u32,
}

impl RateLimit {
    pub fn new(unit: Unit, requests_per_unit: u32) -> Self {
        Self {
            unit,
            requests_per_unit,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptors: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub always_apply: bool,
}

impl Descriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_descriptors(mut self, descriptors: Vec<Descriptor>) -> Self {
        self.descriptors = descriptors;
        self
    }

    fn is_set_descriptor_marker(&self) -> bool {
        self.key == GENERIC_KEY && self.value.as_deref() == Some(SET_DESCRIPTOR_UNIQUE_VALUE)
    }

    fn composite_key(&self) -> String {
        match self.value.as_deref() {
            Some(value) if !value.is_empty() => format!("{}_{}", self.key, value),
            _ => self.key.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleDescriptor {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl SimpleDescriptor {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }

    fn set_descriptor_marker() -> Self {
        Self::new(GENERIC_KEY, Some(SET_DESCRIPTOR_UNIQUE_VALUE))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDescriptor {
    #[serde(default)]
    pub simple_descriptors: Vec<SimpleDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub always_apply: bool,
}

impl SetDescriptor {
    pub fn new(simple_descriptors: Vec<SimpleDescriptor>, rate_limit: RateLimit) -> Self {
        Self {
            simple_descriptors,
            rate_limit: Some(rate_limit),
            always_apply: false,
        }
    }

    pub fn has_marker_prefix(&self) -> bool {
        self.simple_descriptors
            .first()
            .map_or(false, |first| *first == SimpleDescriptor::set_descriptor_marker())
    }

    /// Returns the descriptor with the set-style marker in front, unless it
    /// already starts with it.
    pub fn with_marker_prefix(mut self) -> Self {
        if !self.has_marker_prefix() {
            self.simple_descriptors
                .insert(0, SimpleDescriptor::set_descriptor_marker());
        }
        self
    }
}

/// The `raw` config type of a `RateLimitConfig` resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpec {
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
    #[serde(default)]
    pub set_descriptors: Vec<SetDescriptor>,
    #[serde(default)]
    pub rate_limits: Vec<RateLimitActions>,
}

/// One domain's worth of config, as published to the rate-limit server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XdsRateLimitConfig {
    pub domain: String,
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
    #[serde(default)]
    pub set_descriptors: Vec<SetDescriptor>,
}

impl XdsRateLimitConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Checks the config the same way the rate-limit server does when it
    /// loads a domain.
    pub fn validate(&self) -> Result<(), TranslationError> {
        if self.domain.is_empty() {
            return Err(TranslationError::IllegalDescriptors(
                "rate limit domain must not be empty".to_string(),
            ));
        }
        validate_tree(&self.descriptors)?;
        validate_set_descriptors(&self.set_descriptors)
    }
}

fn validate_rate_limit(key: &str, rate_limit: Option<&RateLimit>) -> Result<(), TranslationError> {
    match rate_limit {
        Some(rl) if !rl.unit.is_known() => Err(TranslationError::UnknownUnit(key.to_string())),
        _ => Ok(()),
    }
}

/// Validates tree descriptors: keys are set, units are known, composite
/// `key[_value]` entries are unique per level and nothing uses the
/// set-descriptor marker.
pub fn validate_tree(descriptors: &[Descriptor]) -> Result<(), TranslationError> {
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        if descriptor.key.is_empty() {
            return Err(TranslationError::IllegalDescriptors(
                "descriptor key must not be empty".to_string(),
            ));
        }
        if descriptor.is_set_descriptor_marker() {
            return Err(TranslationError::IllegalDescriptors(format!(
                "the {GENERIC_KEY} value {SET_DESCRIPTOR_UNIQUE_VALUE} is reserved for set descriptors"
            )));
        }
        let composite_key = descriptor.composite_key();
        if !seen.insert(composite_key.clone()) {
            return Err(TranslationError::IllegalDescriptors(format!(
                "duplicate descriptor composite key '{composite_key}'"
            )));
        }
        validate_rate_limit(&descriptor.key, descriptor.rate_limit.as_ref())?;
        validate_tree(&descriptor.descriptors)?;
    }
    Ok(())
}

pub fn validate_set_descriptors(set_descriptors: &[SetDescriptor]) -> Result<(), TranslationError> {
    for set_descriptor in set_descriptors {
        if set_descriptor.simple_descriptors.is_empty() {
            return Err(TranslationError::IllegalDescriptors(
                "set descriptors need at least one simple descriptor".to_string(),
            ));
        }
        if let Some(empty) = set_descriptor
            .simple_descriptors
            .iter()
            .find(|simple| simple.key.is_empty())
        {
            return Err(TranslationError::IllegalDescriptors(format!(
                "simple descriptor with value {:?} has an empty key",
                empty.value
            )));
        }
        match set_descriptor.rate_limit.as_ref() {
            None => {
                return Err(TranslationError::IllegalDescriptors(
                    "set descriptors require a rate limit".to_string(),
                ))
            }
            Some(rl) => validate_rate_limit(&set_descriptor.simple_descriptors[0].key, Some(rl))?,
        }
    }
    Ok(())
}
