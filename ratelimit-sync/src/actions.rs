//! Proxy-side rate-limit actions.
//!
//! An [`Action`] tells the data plane how to extract one entry of the
//! descriptor sent to the rate-limit server. The list of actions of a
//! [`RouteRateLimit`] builds one descriptor, in order.

use crate::descriptors::SET_DESCRIPTOR_UNIQUE_VALUE;
use crate::errors::TranslationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    SourceCluster(SourceCluster),
    DestinationCluster(DestinationCluster),
    RemoteAddress(RemoteAddress),
    RequestHeaders(RequestHeaders),
    GenericKey(GenericKey),
    HeaderValueMatch(HeaderValueMatch),
    Metadata(MetadataAction),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCluster {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationCluster {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAddress {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeaders {
    pub header_name: String,
    pub descriptor_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericKey {
    pub descriptor_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderValueMatch {
    pub descriptor_value: String,
    #[serde(default = "default_expect_match")]
    pub expect_match: bool,
    #[serde(default)]
    pub headers: Vec<HeaderMatcher>,
}

fn default_expect_match() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMatcher {
    pub name: String,
    #[serde(flatten)]
    pub specifier: HeaderMatchSpecifier,
    #[serde(default)]
    pub invert_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderMatchSpecifier {
    ExactMatch(String),
    RegexMatch(String),
    RangeMatch(Int64Range),
    PresentMatch(bool),
    PrefixMatch(String),
    SuffixMatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Int64Range {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataAction {
    pub descriptor_key: String,
    pub metadata_key: MetadataKey,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub source: MetadataSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataKey {
    pub key: String,
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataSource {
    #[default]
    Dynamic,
    RouteEntry,
}

impl Action {
    pub fn generic_key(value: impl Into<String>) -> Self {
        Self::GenericKey(GenericKey {
            descriptor_value: value.into(),
        })
    }

    pub fn remote_address() -> Self {
        Self::RemoteAddress(RemoteAddress {})
    }

    pub fn request_headers(header_name: impl Into<String>, descriptor_key: impl Into<String>) -> Self {
        Self::RequestHeaders(RequestHeaders {
            header_name: header_name.into(),
            descriptor_key: descriptor_key.into(),
        })
    }

    pub fn header_value_match(
        value: impl Into<String>,
        expect_match: bool,
        headers: Vec<HeaderMatcher>,
    ) -> Self {
        Self::HeaderValueMatch(HeaderValueMatch {
            descriptor_value: value.into(),
            expect_match,
            headers,
        })
    }

    /// The generic-key action that marks a list of actions as set-style.
    pub fn set_descriptor_marker() -> Self {
        Self::generic_key(SET_DESCRIPTOR_UNIQUE_VALUE)
    }

    pub fn is_set_descriptor_marker(&self) -> bool {
        matches!(self, Self::GenericKey(key) if key.descriptor_value == SET_DESCRIPTOR_UNIQUE_VALUE)
    }

    pub fn validate(&self) -> Result<(), TranslationError> {
        let invalid = |reason: &str| Err(TranslationError::InvalidAction(reason.to_string()));
        match self {
            Self::SourceCluster(_) | Self::DestinationCluster(_) | Self::RemoteAddress(_) => Ok(()),
            Self::RequestHeaders(rh) if rh.header_name.is_empty() => {
                invalid("requestHeaders requires a header name")
            }
            Self::RequestHeaders(rh) if rh.descriptor_key.is_empty() => {
                invalid("requestHeaders requires a descriptor key")
            }
            Self::RequestHeaders(_) => Ok(()),
            Self::GenericKey(gk) if gk.descriptor_value.is_empty() => {
                invalid("genericKey requires a descriptor value")
            }
            Self::GenericKey(_) => Ok(()),
            Self::HeaderValueMatch(hvm) if hvm.descriptor_value.is_empty() => {
                invalid("headerValueMatch requires a descriptor value")
            }
            Self::HeaderValueMatch(hvm) if hvm.headers.is_empty() => {
                invalid("headerValueMatch requires at least one header matcher")
            }
            Self::HeaderValueMatch(hvm) if hvm.headers.iter().any(|h| h.name.is_empty()) => {
                invalid("header matchers require a header name")
            }
            Self::HeaderValueMatch(_) => Ok(()),
            Self::Metadata(md) if md.descriptor_key.is_empty() => {
                invalid("metadata requires a descriptor key")
            }
            Self::Metadata(md) if md.metadata_key.key.is_empty() => {
                invalid("metadata requires a metadata key")
            }
            Self::Metadata(_) => Ok(()),
        }
    }
}

impl HeaderMatcher {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifier: HeaderMatchSpecifier::PresentMatch(true),
            invert_match: false,
        }
    }

    pub fn exact(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifier: HeaderMatchSpecifier::ExactMatch(value.into()),
            invert_match: false,
        }
    }
}

/// Actions as written by users: tree-style `actions` plus the parallel
/// `setActions` used with set descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitActions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_actions: Vec<Action>,
}

impl RateLimitActions {
    pub fn new(actions: Vec<Action>, set_actions: Vec<Action>) -> Self {
        Self {
            actions,
            set_actions,
        }
    }
}

/// A rate limit as attached to a virtual host or route of the proxy: the
/// filter stage it runs in and the actions building its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRateLimit {
    pub stage: u32,
    pub actions: Vec<Action>,
}

impl RouteRateLimit {
    pub fn new(stage: u32, actions: Vec<Action>) -> Self {
        Self { stage, actions }
    }
}
