//! Wire encoding of the config published to the rate-limit server.
//!
//! The messages mirror the `RateLimitConfig` resource served by the
//! discovery server; they are packed into `google.protobuf.Any` so the
//! snapshot cache can stay agnostic of the resource types it carries.

use crate::descriptors::{Descriptor, RateLimit, SetDescriptor, SimpleDescriptor, XdsRateLimitConfig};
use prost::Message;
use sha2::{Digest, Sha256};

pub const RATE_LIMIT_CONFIG_TYPE_URL: &str = "type.googleapis.com/glooe.solo.io.RateLimitConfig";

#[derive(Clone, PartialEq, Message)]
pub struct RateLimitConfigProto {
    #[prost(string, tag = "1")]
    pub domain: String,
    #[prost(message, repeated, tag = "2")]
    pub descriptors: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "3")]
    pub set_descriptors: Vec<SetDescriptorProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DescriptorProto {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
    #[prost(message, optional, tag = "3")]
    pub rate_limit: Option<RateLimitProto>,
    #[prost(message, repeated, tag = "4")]
    pub descriptors: Vec<DescriptorProto>,
    #[prost(uint32, tag = "5")]
    pub weight: u32,
    #[prost(bool, tag = "6")]
    pub always_apply: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetDescriptorProto {
    #[prost(message, repeated, tag = "1")]
    pub simple_descriptors: Vec<SimpleDescriptorProto>,
    #[prost(message, optional, tag = "2")]
    pub rate_limit: Option<RateLimitProto>,
    #[prost(bool, tag = "3")]
    pub always_apply: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct SimpleDescriptorProto {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RateLimitProto {
    #[prost(int32, tag = "1")]
    pub unit: i32,
    #[prost(uint32, tag = "2")]
    pub requests_per_unit: u32,
}

impl From<&RateLimit> for RateLimitProto {
    fn from(rl: &RateLimit) -> Self {
        Self {
            unit: rl.unit.into(),
            requests_per_unit: rl.requests_per_unit,
        }
    }
}

impl From<&Descriptor> for DescriptorProto {
    fn from(d: &Descriptor) -> Self {
        Self {
            key: d.key.clone(),
            value: d.value.clone().unwrap_or_default(),
            rate_limit: d.rate_limit.as_ref().map(Into::into),
            descriptors: d.descriptors.iter().map(Into::into).collect(),
            weight: d.weight,
            always_apply: d.always_apply,
        }
    }
}

impl From<&SimpleDescriptor> for SimpleDescriptorProto {
    fn from(sd: &SimpleDescriptor) -> Self {
        Self {
            key: sd.key.clone(),
            value: sd.value.clone().unwrap_or_default(),
        }
    }
}

impl From<&SetDescriptor> for SetDescriptorProto {
    fn from(sd: &SetDescriptor) -> Self {
        Self {
            simple_descriptors: sd.simple_descriptors.iter().map(Into::into).collect(),
            rate_limit: sd.rate_limit.as_ref().map(Into::into),
            always_apply: sd.always_apply,
        }
    }
}

impl From<&XdsRateLimitConfig> for RateLimitConfigProto {
    fn from(config: &XdsRateLimitConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            descriptors: config.descriptors.iter().map(Into::into).collect(),
            set_descriptors: config.set_descriptors.iter().map(Into::into).collect(),
        }
    }
}

impl XdsRateLimitConfig {
    pub fn encode_to_vec(&self) -> Vec<u8> {
        RateLimitConfigProto::from(self).encode_to_vec()
    }

    pub fn to_any(&self) -> prost_types::Any {
        prost_types::Any {
            type_url: RATE_LIMIT_CONFIG_TYPE_URL.to_string(),
            value: self.encode_to_vec(),
        }
    }
}

/// Hex-encoded prefix of the SHA-256 of all chunks, in order.
pub fn content_hash<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.len() as u64).to_be_bytes());
        hasher.update(chunk);
    }
    hex::encode(&hasher.finalize()[..8])
}

/// The version of a set of domains: the hash of their encoded form.
pub fn hash_configs(configs: &[XdsRateLimitConfig]) -> String {
    let encoded: Vec<Vec<u8>> = configs.iter().map(XdsRateLimitConfig::encode_to_vec).collect();
    content_hash(encoded.iter().map(Vec::as_slice))
}
