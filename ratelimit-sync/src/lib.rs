//! Compiles rate-limit intent into Envoy rate-limit configuration.
//!
//! Rate limits come from three places: basic limits set inline on virtual
//! hosts and routes, `RateLimitConfig` resources referenced from them, and
//! descriptors configured gateway-wide in the settings. This crate turns all
//! of them into two outputs:
//!
//! - For the rate-limit server, one descriptor tree per domain (`ingress`,
//! `crd` and `custom`), versioned with a content hash and published to a
//! snapshot cache.
//! - For the proxy, the rate-limit actions of every virtual host and route,
//! indexed by the filter stage that has to run them.
//!
//! # Server side
//!
//! A [`RateLimitSyncer`] runs one collector per domain over every virtual
//! host and route of an [`ApiSnapshot`], validates the result and publishes
//! it under the `ratelimit` role:
//!
//! ```
//! use ratelimit_sync::errors::SyncError;
//! use ratelimit_sync::metrics::MetricsSink;
//! use ratelimit_sync::model::{ApiSnapshot, Settings};
//! use ratelimit_sync::reports::{Reporter, ResourceReports};
//! use ratelimit_sync::snapshot::{InMemorySnapshotCache, SnapshotCache, RATE_LIMIT_ROLE};
//! use ratelimit_sync::{DefaultCollectorFactory, RateLimitSyncer, RlCache, SyncOutcome};
//! use std::sync::Arc;
//!
//! struct NoReports;
//! impl Reporter for NoReports {
//!     fn write_reports(&self, _reports: &ResourceReports) -> Result<(), SyncError> {
//!         Ok(())
//!     }
//! }
//!
//! struct NoMetrics;
//! impl MetricsSink for NoMetrics {
//!     fn set_connected(&self, _role: &str, _connected: bool) {}
//! }
//!
//! let cache = Arc::new(RlCache::new());
//! let syncer = RateLimitSyncer::new(
//!     Arc::new(DefaultCollectorFactory::new(cache)),
//!     Arc::new(NoReports),
//!     Arc::new(NoMetrics),
//! );
//!
//! let snapshot_cache = InMemorySnapshotCache::new();
//! let mut reports = ResourceReports::new();
//! let outcome = syncer
//!     .sync(
//!         &Arc::new(ApiSnapshot::default()),
//!         &Settings::default(),
//!         &snapshot_cache,
//!         &mut reports,
//!     )
//!     .unwrap();
//!
//! assert!(matches!(outcome, SyncOutcome::Published { .. }));
//! assert!(snapshot_cache.get_snapshot(RATE_LIMIT_ROLE).is_some());
//! ```
//!
//! Running the same pass again finds the version already published and
//! leaves the cache alone.
//!
//! # Proxy side
//!
//! A [`RateLimitPlugin`] runs the staged translators and returns, for each
//! proxy, the actions per stage of every virtual host and route:
//!
//! ```
//! use ratelimit_sync::model::{ApiSnapshot, Settings};
//! use ratelimit_sync::reports::ResourceReports;
//! use ratelimit_sync::{RateLimitPlugin, RlCache};
//! use std::sync::Arc;
//!
//! let mut plugin = RateLimitPlugin::with_cache(Arc::new(RlCache::new()));
//! let mut reports = ResourceReports::new();
//! let proxies = plugin
//!     .process_snapshot(&Arc::new(ApiSnapshot::default()), &Settings::default(), &mut reports)
//!     .unwrap();
//! assert!(proxies.is_empty());
//! ```
//!
//! # Stages
//!
//! | Stage | Runs                                           |
//! |-------|------------------------------------------------|
//! | 0     | basic limits                                   |
//! | 1     | `RateLimitConfig` actions, before auth         |
//! | 2     | `RateLimitConfig` actions, after auth          |
//! | 3     | inline set-style actions, before auth          |
//! | 4     | inline set-style actions, after auth           |
//!
//! Errors never stop a pass early. They are attached to the resource they
//! were found in through [`ResourceReports`], and a pass with any error does
//! not publish.

#![deny(clippy::all, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

#[macro_use]
extern crate log;

pub mod actions;
pub mod collectors;
pub mod descriptors;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod plugin;
pub mod reports;
pub mod rl_cache;
pub mod snapshot;
pub mod staged;
pub mod syncer;
pub mod translation;
pub mod xds;

pub use crate::collectors::{CollectorFactory, CollectorType, ConfigCollector, DefaultCollectorFactory};
pub use crate::model::ApiSnapshot;
pub use crate::plugin::RateLimitPlugin;
pub use crate::reports::ResourceReports;
pub use crate::rl_cache::RlCache;
pub use crate::syncer::{RateLimitSyncer, SyncOutcome};
