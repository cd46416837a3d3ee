use ratelimit_sync::descriptors::{Descriptor, RateLimit, RawSpec, Unit};
use ratelimit_sync::model::{
    HttpListener, HttpListenerOptions, HybridListener, IngressRateLimit, Listener, ListenerType,
    MatchedListener, Metadata, Proxy, RateLimitConfig, RateLimitOptions, RateLimitServerSettings,
    ResourceRef, Route, VirtualHost,
};

pub fn anonymous_limit(unit: Unit, requests_per_unit: u32) -> RateLimitOptions {
    RateLimitOptions {
        ratelimit_basic: Some(IngressRateLimit {
            authorized_limits: None,
            anonymous_limits: Some(RateLimit::new(unit, requests_per_unit)),
        }),
        ..Default::default()
    }
}

pub fn config_refs(refs: &[&str]) -> RateLimitOptions {
    RateLimitOptions {
        rate_limit_configs: refs.iter().map(|name| ResourceRef::new("default", *name)).collect(),
        ..Default::default()
    }
}

pub fn virtual_host(name: &str, options: RateLimitOptions) -> VirtualHost {
    VirtualHost {
        name: name.to_string(),
        domains: vec!["*".to_string()],
        routes: vec![],
        options,
    }
}

pub fn with_routes(mut virtual_host: VirtualHost, routes: Vec<Route>) -> VirtualHost {
    virtual_host.routes = routes;
    virtual_host
}

pub fn route(name: &str, options: RateLimitOptions) -> Route {
    Route {
        name: name.to_string(),
        options,
    }
}

pub fn http_listener(virtual_hosts: Vec<VirtualHost>) -> Listener {
    Listener {
        name: "listener-::-8080".to_string(),
        listener_type: ListenerType::HttpListener(HttpListener {
            virtual_hosts,
            ..Default::default()
        }),
    }
}

/// An HTTP listener that rate limits before auth, whatever the settings say.
pub fn before_auth_listener(virtual_hosts: Vec<VirtualHost>) -> Listener {
    Listener {
        name: "listener-::-8081".to_string(),
        listener_type: ListenerType::HttpListener(HttpListener {
            virtual_hosts,
            options: HttpListenerOptions {
                ratelimit_server: Some(RateLimitServerSettings {
                    rate_limit_before_auth: true,
                    ..Default::default()
                }),
            },
        }),
    }
}

pub fn hybrid_listener(virtual_hosts: Vec<VirtualHost>) -> Listener {
    Listener {
        name: "listener-::-8443".to_string(),
        listener_type: ListenerType::HybridListener(HybridListener {
            matched_listeners: vec![MatchedListener {
                http_listener: Some(HttpListener {
                    virtual_hosts,
                    ..Default::default()
                }),
            }],
        }),
    }
}

pub fn proxy(name: &str, listeners: Vec<Listener>) -> Proxy {
    Proxy {
        metadata: Metadata::new("gloo-system", name),
        listeners,
    }
}

/// A `RateLimitConfig` in the `default` namespace limiting
/// `generic_key: <value>`.
pub fn rate_limit_config(name: &str, value: &str, rate_limit: RateLimit) -> RateLimitConfig {
    RateLimitConfig::new(
        "default",
        name,
        RawSpec {
            descriptors: vec![Descriptor::new("generic_key")
                .with_value(value)
                .with_rate_limit(rate_limit)],
            ..Default::default()
        },
    )
}
