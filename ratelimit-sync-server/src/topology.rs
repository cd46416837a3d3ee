use crate::RateLimitSyncServerError;
use ratelimit_sync::model::{ApiSnapshot, Proxy, RateLimitConfig, Settings};
use serde::Deserialize;
use std::path::Path;

/// The content of a topology file: gateway settings, proxies and
/// `RateLimitConfig` resources. Enum variants are written as single-key maps
/// (`httpListener: {...}`, `genericKey: {...}`).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub proxies: Vec<Proxy>,
    #[serde(default)]
    pub ratelimit_configs: Vec<RateLimitConfig>,
}

impl Topology {
    pub fn load_from_file<P: AsRef<Path>>(path: &P) -> Result<Self, RateLimitSyncServerError> {
        match std::fs::File::open(path) {
            Ok(f) => {
                let parsed: Result<Topology, _> =
                    serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_reader(f));
                parsed.map_err(|e| RateLimitSyncServerError::ConfigFile(format!("Couldn't parse: {e}")))
            }
            Err(e) => Err(RateLimitSyncServerError::ConfigFile(format!(
                "Couldn't read file '{}': {}",
                path.as_ref().display(),
                e
            ))),
        }
    }

    pub fn into_snapshot(self) -> (Settings, ApiSnapshot) {
        (self.settings, ApiSnapshot::new(self.proxies, self.ratelimit_configs))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use ratelimit_sync::actions::Action;
    use ratelimit_sync::descriptors::{RateLimit, Unit};
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub const TOPOLOGY: &str = r#"
settings:
  ratelimitServer:
    rateLimitBeforeAuth: false
  ratelimit:
    descriptors:
      - key: generic_key
        value: per-minute
        rateLimit:
          unit: MINUTE
          requestsPerUnit: 10
proxies:
  - metadata:
      name: gateway-proxy
      namespace: gloo-system
    listeners:
      - name: listener-::-8080
        httpListener:
          virtualHosts:
            - name: foo.host
              domains: ["foo.host"]
              options:
                ratelimitBasic:
                  anonymousLimits:
                    unit: MINUTE
                    requestsPerUnit: 3
              routes:
                - name: per-path
                  options:
                    rateLimitConfigs:
                      - namespace: default
                        name: per-path
ratelimitConfigs:
  - metadata:
      name: per-path
      namespace: default
    spec:
      raw:
        descriptors:
          - key: generic_key
            value: per-path
            rateLimit:
              unit: SECOND
              requestsPerUnit: 5
        rateLimits:
          - actions:
              - genericKey:
                  descriptorValue: per-path
"#;

    pub fn topology_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_topology_file() {
        let file = topology_file(TOPOLOGY);

        let topology = Topology::load_from_file(&file.path()).unwrap();

        assert_eq!(topology.proxies.len(), 1);
        let virtual_host = &topology.proxies[0].listeners[0].http_listeners()[0].virtual_hosts[0];
        assert_eq!(virtual_host.name, "foo.host");
        assert_eq!(
            virtual_host
                .options
                .ratelimit_basic
                .as_ref()
                .unwrap()
                .anonymous_limits,
            Some(RateLimit::new(Unit::Minute, 3))
        );
        let raw = topology.ratelimit_configs[0].spec.raw.as_ref().unwrap();
        assert_eq!(raw.rate_limits[0].actions, vec![Action::generic_key("per-path")]);
        assert_eq!(
            topology.settings.ratelimit.as_ref().unwrap().descriptors[0].value.as_deref(),
            Some("per-minute")
        );
    }

    #[test]
    fn reports_unreadable_and_invalid_files() {
        let missing = Topology::load_from_file(&"/nonexistent/topology.yaml").unwrap_err();
        assert!(missing.to_string().contains("Couldn't read file"));

        let file = topology_file("proxies: 42");
        let invalid = Topology::load_from_file(&file.path()).unwrap_err();
        assert!(invalid.to_string().contains("Couldn't parse"));
    }

    #[test]
    fn empty_file_is_an_empty_topology() {
        let file = topology_file("{}");

        let (settings, snapshot) = Topology::load_from_file(&file.path()).unwrap().into_snapshot();

        assert_eq!(settings, Settings::default());
        assert!(snapshot.proxies.is_empty());
    }
}
