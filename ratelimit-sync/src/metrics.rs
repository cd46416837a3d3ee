/// Receives the outcome of every sync pass.
///
/// The syncer only knows this trait; the embedding process decides how the
/// state is exported.
pub trait MetricsSink: Send + Sync {
    /// `connected` is true once a snapshot for `role` has been published (or
    /// was already up to date), false when a pass failed.
    fn set_connected(&self, role: &str, connected: bool);
}
