use ratelimit_sync::descriptors::RawSpec;
use ratelimit_sync::errors::{SyncError, TranslationError};
use ratelimit_sync::metrics::MetricsSink;
use ratelimit_sync::model::RateLimitConfig;
use ratelimit_sync::actions::RateLimitActions;
use ratelimit_sync::reports::{Reporter, ResourceReports};
use ratelimit_sync::translation::{CrdTranslator, RateLimitConfigTranslator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// Test doubles for the outer seams of a sync pass. They keep everything they
// are handed so the tests can assert on it afterwards.

#[derive(Default)]
pub struct RecordingReporter {
    written: Mutex<Vec<ResourceReports>>,
}

impl RecordingReporter {
    pub fn written(&self) -> Vec<ResourceReports> {
        self.written.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ResourceReports> {
        self.written.lock().unwrap().last().cloned()
    }
}

impl Reporter for RecordingReporter {
    fn write_reports(&self, reports: &ResourceReports) -> Result<(), SyncError> {
        self.written.lock().unwrap().push(reports.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    states: Mutex<Vec<(String, bool)>>,
}

impl RecordingMetrics {
    pub fn last_state(&self, role: &str) -> Option<bool> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(r, _)| r == role)
            .map(|(_, connected)| *connected)
    }
}

impl MetricsSink for RecordingMetrics {
    fn set_connected(&self, role: &str, connected: bool) {
        self.states.lock().unwrap().push((role.to_string(), connected));
    }
}

/// Counts how often each resource gets translated.
#[derive(Default)]
pub struct CountingCrdTranslator {
    inner: CrdTranslator,
    descriptor_calls: AtomicUsize,
}

impl CountingCrdTranslator {
    pub fn descriptor_calls(&self) -> usize {
        self.descriptor_calls.load(Ordering::SeqCst)
    }
}

impl RateLimitConfigTranslator for CountingCrdTranslator {
    fn to_descriptors(&self, config: &RateLimitConfig) -> Result<RawSpec, TranslationError> {
        self.descriptor_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.to_descriptors(config)
    }

    fn to_actions(&self, config: &RateLimitConfig) -> Result<Vec<RateLimitActions>, TranslationError> {
        self.inner.to_actions(config)
    }
}
