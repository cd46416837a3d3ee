// TOPOLOGY_FILE: Path
//
// RATE_LIMIT_BEFORE_AUTH: bool, forces before-auth over the file's settings
// RATE_LIMIT_COLLECTORS: comma separated list of basic, crd, global
// RL_CACHE_CAPACITY: usize
//
// HTTP_API_HOST: host // just to become HTTP_API_HOST:HTTP_API_PORT as &str
// HTTP_API_PORT: port

use crate::RateLimitSyncServerError;
use ratelimit_sync::CollectorType;
use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub topology_file: String,
    http_host: String,
    http_port: u16,
    pub rate_limit_before_auth: bool,
    pub rl_cache_capacity: usize,
    pub collectors: Vec<CollectorType>,
}

impl Configuration {
    pub const DEFAULT_HTTP_PORT: &'static str = "8080";
    pub const DEFAULT_IP_BIND: &'static str = "0.0.0.0";
    pub const DEFAULT_RL_CACHE_CAPACITY: &'static str = "10";

    pub fn from_env() -> Result<Self, RateLimitSyncServerError> {
        let topology_file = env::var("TOPOLOGY_FILE")
            .map_err(|_| RateLimitSyncServerError::Config("No topology file provided!".to_string()))?;
        let http_port = env::var("HTTP_API_PORT").unwrap_or_else(|_| Self::DEFAULT_HTTP_PORT.to_string());
        let rl_cache_capacity =
            env::var("RL_CACHE_CAPACITY").unwrap_or_else(|_| Self::DEFAULT_RL_CACHE_CAPACITY.to_string());

        Ok(Self {
            topology_file,
            http_host: env::var("HTTP_API_HOST").unwrap_or_else(|_| Self::DEFAULT_IP_BIND.to_string()),
            http_port: http_port.parse().map_err(|_| {
                RateLimitSyncServerError::Config(format!("Expected a port number, got '{http_port}'"))
            })?,
            rate_limit_before_auth: env_option_is_enabled("RATE_LIMIT_BEFORE_AUTH"),
            rl_cache_capacity: rl_cache_capacity.parse().map_err(|_| {
                RateLimitSyncServerError::Config(format!(
                    "Expected a cache capacity, got '{rl_cache_capacity}'"
                ))
            })?,
            collectors: match env::var("RATE_LIMIT_COLLECTORS") {
                Ok(value) => parse_collectors(&value)?,
                Err(_) => CollectorType::ALL.to_vec(),
            },
        })
    }

    pub fn with(
        topology_file: String,
        http_host: String,
        http_port: u16,
        rate_limit_before_auth: bool,
        rl_cache_capacity: usize,
        collectors: Vec<CollectorType>,
    ) -> Self {
        Self {
            topology_file,
            http_host,
            http_port,
            rate_limit_before_auth,
            rl_cache_capacity,
            collectors,
        }
    }

    pub fn http_address(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            topology_file: String::new(),
            http_host: Self::DEFAULT_IP_BIND.to_string(),
            http_port: 8080,
            rate_limit_before_auth: false,
            rl_cache_capacity: 10,
            collectors: CollectorType::ALL.to_vec(),
        }
    }
}

fn parse_collectors(value: &str) -> Result<Vec<CollectorType>, RateLimitSyncServerError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse()
                .map_err(|e| RateLimitSyncServerError::Config(format!("{e}")))
        })
        .collect()
}

fn env_option_is_enabled(env_name: &str) -> bool {
    match env::var(env_name) {
        Ok(value) => value == "1",
        Err(_) => false,
    }
}
