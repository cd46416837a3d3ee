//! The input of a sync pass: the proxy topology, the `RateLimitConfig`
//! resources and the gateway-wide settings.

use crate::actions::RateLimitActions;
use crate::descriptors::{Descriptor, RateLimit, RawSpec, SetDescriptor};
use crate::xds::content_hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_AUTH_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub generation: i64,
}

impl Metadata {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            generation: 0,
        }
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRateLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_limits: Option<RateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_limits: Option<RateLimit>,
}

/// Rate-limit fields shared by virtual hosts and routes.
///
/// `rate_limit_configs` and `ratelimit` run before or after auth depending on
/// the settings; the `early`/`regular` variants pin the ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratelimit_basic: Option<IngressRateLimit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limit_configs: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limit_early_configs: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limit_regular_configs: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratelimit: Vec<RateLimitActions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratelimit_early: Vec<RateLimitActions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratelimit_regular: Vec<RateLimitActions>,
}

impl RateLimitOptions {
    pub fn config_refs(&self) -> impl Iterator<Item = &ResourceRef> {
        self.rate_limit_early_configs
            .iter()
            .chain(self.rate_limit_regular_configs.iter())
            .chain(self.rate_limit_configs.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: RateLimitOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub options: RateLimitOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpListenerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratelimit_server: Option<RateLimitServerSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpListener {
    #[serde(default)]
    pub virtual_hosts: Vec<VirtualHost>,
    #[serde(default)]
    pub options: HttpListenerOptions,
}

impl HttpListener {
    pub fn rate_limit_before_auth(&self) -> bool {
        self.options
            .ratelimit_server
            .as_ref()
            .map_or(false, |server| server.rate_limit_before_auth)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedListener {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_listener: Option<HttpListener>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridListener {
    #[serde(default)]
    pub matched_listeners: Vec<MatchedListener>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpListener {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerType {
    HttpListener(HttpListener),
    HybridListener(HybridListener),
    TcpListener(TcpListener),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub name: String,
    #[serde(flatten)]
    pub listener_type: ListenerType,
}

impl Listener {
    /// Every HTTP listener this listener serves, including the ones nested
    /// in a hybrid listener.
    pub fn http_listeners(&self) -> Vec<&HttpListener> {
        match &self.listener_type {
            ListenerType::HttpListener(http) => vec![http],
            ListenerType::HybridListener(hybrid) => hybrid
                .matched_listeners
                .iter()
                .filter_map(|matched| matched.http_listener.as_ref())
                .collect(),
            ListenerType::TcpListener(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub metadata: Metadata,
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitServerSettings {
    #[serde(default)]
    pub rate_limit_before_auth: bool,
    #[serde(default)]
    pub deny_on_fail: bool,
    #[serde(default)]
    pub enable_x_ratelimit_headers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
    #[serde(default)]
    pub set_descriptors: Vec<SetDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtAuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_header: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratelimit_server: Option<RateLimitServerSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratelimit: Option<ServiceSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extauth: Option<ExtAuthSettings>,
}

impl Settings {
    pub fn rate_limit_before_auth(&self) -> bool {
        self.ratelimit_server
            .as_ref()
            .map_or(false, |server| server.rate_limit_before_auth)
    }

    pub fn auth_user_id_header(&self) -> &str {
        self.extauth
            .as_ref()
            .and_then(|extauth| extauth.user_id_header.as_deref())
            .filter(|header| !header.is_empty())
            .unwrap_or(DEFAULT_AUTH_HEADER)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConfigState {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfigStatus {
    #[serde(default)]
    pub state: ConfigState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub observed_generation: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: RateLimitConfigSpec,
    #[serde(default)]
    pub status: RateLimitConfigStatus,
}

impl RateLimitConfig {
    pub fn new(namespace: &str, name: &str, raw: RawSpec) -> Self {
        Self {
            metadata: Metadata::new(namespace, name),
            spec: RateLimitConfigSpec { raw: Some(raw) },
            status: RateLimitConfigStatus::default(),
        }
    }
}

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

fn next_snapshot_id() -> u64 {
    NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Everything a sync pass reads. Each instance gets its own id, so two
/// snapshots with the same content are still told apart by caches keyed on
/// identity.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSnapshot {
    #[serde(skip, default = "next_snapshot_id")]
    id: u64,
    #[serde(default)]
    pub proxies: Vec<Proxy>,
    #[serde(default)]
    pub ratelimit_configs: Vec<RateLimitConfig>,
}

impl Default for ApiSnapshot {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Clone for ApiSnapshot {
    fn clone(&self) -> Self {
        Self::new(self.proxies.clone(), self.ratelimit_configs.clone())
    }
}

impl ApiSnapshot {
    pub fn new(proxies: Vec<Proxy>, ratelimit_configs: Vec<RateLimitConfig>) -> Self {
        Self {
            id: next_snapshot_id(),
            proxies,
            ratelimit_configs,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn find_rate_limit_config(&self, namespace: &str, name: &str) -> Option<&RateLimitConfig> {
        self.ratelimit_configs
            .iter()
            .find(|config| config.metadata.namespace == namespace && config.metadata.name == name)
    }

    /// Content hash of the snapshot, independent of its id.
    pub fn hash(&self) -> String {
        // Serializing plain data structures into a Vec cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        content_hash([bytes.as_slice()])
    }
}

/// Replaces every character Envoy does not accept in a resource name.
pub fn sanitize_for_envoy(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
