use ratelimit_sync::errors::SyncError;
use ratelimit_sync::reports::{Reporter, ResourceReports};
use std::sync::RwLock;

/// Logs every rejected resource and keeps the reports of the last pass for
/// the admin API.
#[derive(Default)]
pub struct StatusReporter {
    last: RwLock<Option<ResourceReports>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_reports(&self) -> Option<ResourceReports> {
        self.last.read().ok().and_then(|last| last.clone())
    }
}

impl Reporter for StatusReporter {
    fn write_reports(&self, reports: &ResourceReports) -> Result<(), SyncError> {
        for (id, report) in reports.iter() {
            if report.is_accepted() {
                debug!("{} accepted", id);
            } else {
                warn!("{} rejected: {}", id, report.status(0).message);
            }
            for warning in &report.warnings {
                info!("{}: {}", id, warning);
            }
        }

        let mut last = self
            .last
            .write()
            .map_err(|e| SyncError::Report(e.to_string()))?;
        *last = Some(reports.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratelimit_sync::errors::TranslationError;
    use ratelimit_sync::model::{Metadata, Proxy};
    use ratelimit_sync::reports::ResourceId;

    #[test]
    fn keeps_the_last_reports() {
        let reporter = StatusReporter::new();
        assert!(reporter.last_reports().is_none());

        let proxy = Proxy {
            metadata: Metadata::new("gloo-system", "gateway-proxy"),
            listeners: vec![],
        };
        let mut first = ResourceReports::new();
        first.add_error(ResourceId::proxy(&proxy), TranslationError::MissingName);
        reporter.write_reports(&first).unwrap();

        let mut second = ResourceReports::new();
        second.accept_proxies([&proxy]);
        reporter.write_reports(&second).unwrap();

        let last = reporter.last_reports().unwrap();
        assert_eq!(last, second);
        assert!(last.get(&ResourceId::proxy(&proxy)).unwrap().is_accepted());
    }
}
