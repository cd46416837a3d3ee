use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use ratelimit_sync::metrics::MetricsSink;
use std::sync::Arc;

const ROLE_LABEL: &str = "role";

pub struct PrometheusMetrics {
    prometheus_handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, BuildError> {
        Ok(Self::new_with_handle(Arc::new(Self::init_handle()?)))
    }

    pub(crate) fn new_with_handle(prometheus_handle: Arc<PrometheusHandle>) -> Self {
        describe_gauge!("ratelimit_sync_up", "The rate limit syncer is running");
        gauge!("ratelimit_sync_up").set(1.0);
        describe_gauge!(
            "ratelimit_xds_connected_state",
            "Whether the last sync pass for a role published a usable snapshot"
        );
        describe_counter!("sync_passes", "Sync passes run, by outcome");
        Self { prometheus_handle }
    }

    // Creates and installs the prometheus exporter as global recorder
    // Only one recorder can be registered for the lifetime of the application
    fn init_handle() -> Result<PrometheusHandle, BuildError> {
        PrometheusBuilder::new().install_recorder()
    }

    pub fn incr_sync_passes(&self, outcome: &'static str) {
        counter!("sync_passes", "outcome" => outcome).increment(1)
    }

    pub fn gather_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn set_connected(&self, role: &str, connected: bool) {
        let state = if connected { 1.0 } else { 0.0 };
        gauge!("ratelimit_xds_connected_state", ROLE_LABEL => role.to_string()).set(state)
    }
}
