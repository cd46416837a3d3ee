//! Translators from user-facing rate-limit config to server descriptors and
//! proxy actions.

pub mod basic;
pub mod crd;
pub mod global;

pub use basic::{BasicRateLimitTranslator, BasicTranslator};
pub use crd::{CrdTranslator, RateLimitConfigTranslator};
pub use global::{GlobalRateLimitTranslator, GlobalTranslator};
