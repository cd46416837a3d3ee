//! Basic (ingress) rate limits.
//!
//! A basic config limits authenticated requests per user id and anonymous
//! requests per client address. On the server it becomes a descriptor tree
//! rooted at `generic_key: <name>`:
//!
//! ```text
//! generic_key: <name>
//! ├── header_match: is-authenticated
//! │   └── userid                      (authorized limit)
//! └── header_match: not-authenticated
//!     └── remote_address              (anonymous limit)
//! ```
//!
//! On the proxy it becomes two action lists that check the presence of the
//! auth header with opposite expectations, so only one of them produces a
//! descriptor for a given request.

use crate::actions::{Action, HeaderMatcher, RouteRateLimit};
use crate::descriptors::{Descriptor, RateLimit, GENERIC_KEY};
use crate::errors::TranslationError;
use crate::model::IngressRateLimit;

pub const HEADER_MATCH_KEY: &str = "header_match";
pub const AUTHENTICATED: &str = "is-authenticated";
pub const NOT_AUTHENTICATED: &str = "not-authenticated";
pub const USER_ID_KEY: &str = "userid";
pub const REMOTE_ADDRESS_KEY: &str = "remote_address";

pub trait BasicRateLimitTranslator: Send + Sync {
    fn generate_server_config(
        &self,
        name: &str,
        config: &IngressRateLimit,
    ) -> Result<Descriptor, TranslationError>;

    fn generate_resource_config(&self, name: &str, header_name: &str, stage: u32) -> Vec<RouteRateLimit>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTranslator;

fn limited_branch(
    auth_state: &str,
    key: &str,
    rate_limit: &RateLimit,
) -> Result<Descriptor, TranslationError> {
    if !rate_limit.unit.is_known() {
        return Err(TranslationError::UnknownUnit(key.to_string()));
    }
    Ok(Descriptor::new(HEADER_MATCH_KEY)
        .with_value(auth_state)
        .with_descriptors(vec![Descriptor::new(key).with_rate_limit(*rate_limit)]))
}

impl BasicRateLimitTranslator for BasicTranslator {
    fn generate_server_config(
        &self,
        name: &str,
        config: &IngressRateLimit,
    ) -> Result<Descriptor, TranslationError> {
        let mut branches = Vec::with_capacity(2);
        if let Some(authorized) = &config.authorized_limits {
            branches.push(limited_branch(AUTHENTICATED, USER_ID_KEY, authorized)?);
        }
        if let Some(anonymous) = &config.anonymous_limits {
            branches.push(limited_branch(NOT_AUTHENTICATED, REMOTE_ADDRESS_KEY, anonymous)?);
        }

        Ok(Descriptor::new(GENERIC_KEY)
            .with_value(name)
            .with_descriptors(branches))
    }

    fn generate_resource_config(&self, name: &str, header_name: &str, stage: u32) -> Vec<RouteRateLimit> {
        let authenticated = vec![
            Action::generic_key(name),
            Action::header_value_match(AUTHENTICATED, true, vec![HeaderMatcher::present(header_name)]),
            Action::request_headers(header_name, USER_ID_KEY),
        ];
        let anonymous = vec![
            Action::generic_key(name),
            Action::header_value_match(
                NOT_AUTHENTICATED,
                false,
                vec![HeaderMatcher::present(header_name)],
            ),
            Action::remote_address(),
        ];

        vec![
            RouteRateLimit::new(stage, authenticated),
            RouteRateLimit::new(stage, anonymous),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::Unit;

    #[test]
    fn anonymous_only_config() {
        let config = IngressRateLimit {
            authorized_limits: None,
            anonymous_limits: Some(RateLimit::new(Unit::Minute, 3)),
        };

        let descriptor = BasicTranslator
            .generate_server_config("foo.host", &config)
            .unwrap();

        assert_eq!(
            descriptor,
            Descriptor::new(GENERIC_KEY)
                .with_value("foo.host")
                .with_descriptors(vec![Descriptor::new(HEADER_MATCH_KEY)
                    .with_value(NOT_AUTHENTICATED)
                    .with_descriptors(vec![Descriptor::new(REMOTE_ADDRESS_KEY)
                        .with_rate_limit(RateLimit::new(Unit::Minute, 3))])])
        );
    }

    #[test]
    fn both_branches_are_generated() {
        let config = IngressRateLimit {
            authorized_limits: Some(RateLimit::new(Unit::Second, 10)),
            anonymous_limits: Some(RateLimit::new(Unit::Hour, 100)),
        };

        let descriptor = BasicTranslator.generate_server_config("vh", &config).unwrap();

        let values: Vec<_> = descriptor
            .descriptors
            .iter()
            .map(|d| d.value.as_deref().unwrap())
            .collect();
        assert_eq!(values, vec![AUTHENTICATED, NOT_AUTHENTICATED]);
        assert_eq!(descriptor.descriptors[0].descriptors[0].key, USER_ID_KEY);
    }

    #[test]
    fn unknown_unit_fails() {
        let config = IngressRateLimit {
            authorized_limits: Some(RateLimit::new(Unit::Unknown, 10)),
            anonymous_limits: None,
        };

        assert_eq!(
            BasicTranslator.generate_server_config("vh", &config),
            Err(TranslationError::UnknownUnit(USER_ID_KEY.to_string()))
        );
    }

    #[test]
    fn resource_config_checks_the_header_both_ways() {
        let rate_limits = BasicTranslator.generate_resource_config("vh", "x-user-id", 7);

        assert_eq!(rate_limits.len(), 2);
        assert!(rate_limits.iter().all(|rl| rl.stage == 7));
        assert_eq!(
            rate_limits[0].actions[1],
            Action::header_value_match(AUTHENTICATED, true, vec![HeaderMatcher::present("x-user-id")])
        );
        assert_eq!(
            rate_limits[1].actions[1],
            Action::header_value_match(
                NOT_AUTHENTICATED,
                false,
                vec![HeaderMatcher::present("x-user-id")]
            )
        );
        assert_eq!(rate_limits[1].actions[2], Action::remote_address());
    }
}
