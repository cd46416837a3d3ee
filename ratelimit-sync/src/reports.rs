//! Per-resource reports produced by a sync pass.
//!
//! Every proxy and `RateLimitConfig` in the snapshot gets an entry; errors
//! reject the resource, warnings are informational. The reports are handed
//! to a [`Reporter`] at the end of every pass, whatever its outcome.

use crate::errors::{ErrorList, SyncError};
use crate::model::{ConfigState, Proxy, RateLimitConfig, RateLimitConfigStatus, ResourceRef};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    Proxy,
    RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub reference: ResourceRef,
}

impl ResourceId {
    pub fn proxy(proxy: &Proxy) -> Self {
        Self {
            kind: ResourceKind::Proxy,
            reference: proxy.metadata.resource_ref(),
        }
    }

    pub fn rate_limit_config(reference: ResourceRef) -> Self {
        Self {
            kind: ResourceKind::RateLimitConfig,
            reference,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.reference)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub errors: Vec<SyncError>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }

    /// The status a resource with this report should be given.
    pub fn status(&self, observed_generation: i64) -> RateLimitConfigStatus {
        if self.is_accepted() {
            RateLimitConfigStatus {
                state: ConfigState::Accepted,
                message: self.warnings.join("; "),
                observed_generation,
            }
        } else {
            RateLimitConfigStatus {
                state: ConfigState::Rejected,
                message: self
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
                observed_generation,
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceReports {
    reports: BTreeMap<ResourceId, Report>,
}

impl ResourceReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure the resource has an entry. Existing errors are kept.
    pub fn accept(&mut self, id: ResourceId) {
        self.reports.entry(id).or_default();
    }

    pub fn accept_proxies<'a>(&mut self, proxies: impl IntoIterator<Item = &'a Proxy>) {
        for proxy in proxies {
            self.accept(ResourceId::proxy(proxy));
        }
    }

    pub fn accept_rate_limit_configs<'a>(&mut self, configs: impl IntoIterator<Item = &'a RateLimitConfig>) {
        for config in configs {
            self.accept(ResourceId::rate_limit_config(config.metadata.resource_ref()));
        }
    }

    pub fn add_error(&mut self, id: ResourceId, error: impl Into<SyncError>) {
        self.reports.entry(id).or_default().errors.push(error.into());
    }

    pub fn add_warning(&mut self, id: ResourceId, warning: impl Into<String>) {
        self.reports
            .entry(id)
            .or_default()
            .warnings
            .push(warning.into());
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Report> {
        self.reports.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &Report)> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// All errors of all resources.
    pub fn errors(&self) -> ErrorList<SyncError> {
        self.reports
            .values()
            .flat_map(|report| report.errors.iter().cloned())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ErrorList<SyncError>> {
        self.errors().into_result(())
    }

    /// Adds the errors and warnings of `other` that this map does not hold
    /// yet. An error found by both sides is kept as many times as the side
    /// that found it most often.
    pub fn merge(&mut self, other: &ResourceReports) {
        for (id, theirs) in other.iter() {
            let ours = self.reports.entry(id.clone()).or_default();
            let mut missing: Vec<SyncError> = Vec::new();
            for error in &theirs.errors {
                let wanted = theirs.errors.iter().filter(|e| *e == error).count();
                let held = ours.errors.iter().chain(&missing).filter(|e| *e == error).count();
                if held < wanted {
                    missing.push(error.clone());
                }
            }
            ours.errors.extend(missing);
            for warning in &theirs.warnings {
                if !ours.warnings.contains(warning) {
                    ours.warnings.push(warning.clone());
                }
            }
        }
    }
}

/// Writes reports back to wherever resource status lives.
pub trait Reporter: Send + Sync {
    fn write_reports(&self, reports: &ResourceReports) -> Result<(), SyncError>;
}
