//! Staged translators: turn the rate-limit fields of virtual hosts and routes
//! into proxy actions, grouped by the filter stage they run in.
//!
//! Envoy runs one rate-limit filter per stage. Basic limits run in the
//! ingress stage after auth; `RateLimitConfig` references and inline set
//! actions run either before or after auth, depending on whether they are
//! pinned (`early`/`regular`) or follow the gateway setting.

use crate::actions::{RateLimitActions, RouteRateLimit};
use crate::errors::{ErrorList, TranslationError};
use crate::model::{ApiSnapshot, HttpListener, Proxy, Route, Settings, VirtualHost};
use std::collections::BTreeMap;
use std::sync::Arc;

mod crd;
mod hybrid;
mod ingress;
mod set_action;

pub use crd::CrdStagedTranslator;
pub use hybrid::{merge_stage_rate_limits, HybridTranslator};
pub use ingress::IngressTranslator;
pub use set_action::SetActionTranslator;

pub const INGRESS_RATE_LIMIT_STAGE: u32 = 0;
pub const CRD_RATE_LIMIT_STAGE_BEFORE_AUTH: u32 = 1;
pub const CRD_RATE_LIMIT_STAGE: u32 = 2;
pub const SET_ACTION_RATE_LIMIT_STAGE_BEFORE_AUTH: u32 = 3;
pub const SET_ACTION_RATE_LIMIT_STAGE: u32 = 4;

pub type StagedRateLimits = BTreeMap<u32, Vec<RouteRateLimit>>;

/// What a staged translator produced for one virtual host or route. Errors
/// don't discard the stages that were translated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedRateLimits {
    pub by_stage: StagedRateLimits,
    pub errors: ErrorList<TranslationError>,
}

impl TranslatedRateLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stage: u32, rate_limits: Vec<RouteRateLimit>) {
        if rate_limits.is_empty() {
            return;
        }
        self.by_stage.entry(stage).or_default().extend(rate_limits);
    }

    pub fn push_error(&mut self, error: TranslationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.by_stage.is_empty() && self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<StagedRateLimits, ErrorList<TranslationError>> {
        self.errors.into_result(self.by_stage)
    }
}

#[derive(Clone, Copy)]
pub struct VirtualHostParams<'a> {
    pub snapshot: &'a Arc<ApiSnapshot>,
    pub proxy: &'a Proxy,
    pub listener: &'a HttpListener,
}

#[derive(Clone, Copy)]
pub struct RouteParams<'a> {
    pub virtual_host_params: VirtualHostParams<'a>,
    pub virtual_host: &'a VirtualHost,
}

pub trait StagedTranslator: Send {
    /// Called once per pass, before any virtual host is translated.
    fn init(&mut self, settings: &Settings) -> Result<(), TranslationError>;

    fn virtual_host_rate_limits_by_stage(
        &mut self,
        params: &VirtualHostParams<'_>,
        virtual_host: &VirtualHost,
    ) -> TranslatedRateLimits;

    fn route_rate_limits_by_stage(&mut self, params: &RouteParams<'_>, route: &Route) -> TranslatedRateLimits;
}

/// Before-auth stage when the gateway or the listener says so.
fn pick_stage(before_auth: bool, listener: &HttpListener, before: u32, after: u32) -> u32 {
    if before_auth || listener.rate_limit_before_auth() {
        before
    } else {
        after
    }
}

/// One rate limit per non-empty action list. Tree actions are skipped unless
/// `with_actions` is set.
fn route_rate_limits(stage: u32, actions: &[RateLimitActions], with_actions: bool) -> Vec<RouteRateLimit> {
    let mut rate_limits = Vec::new();
    for rate_limit_actions in actions {
        if with_actions && !rate_limit_actions.actions.is_empty() {
            rate_limits.push(RouteRateLimit::new(stage, rate_limit_actions.actions.clone()));
        }
        if !rate_limit_actions.set_actions.is_empty() {
            rate_limits.push(RouteRateLimit::new(stage, rate_limit_actions.set_actions.clone()));
        }
    }
    rate_limits
}
