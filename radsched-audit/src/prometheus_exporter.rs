use crate::metrics::SchedulerMetrics;

/// Prometheus exposition endpoint handler, mounted by `radsched-server` at
/// `/metrics`. Returns metrics in Prometheus text format for scraping.
pub fn render_metrics(collector: &SchedulerMetrics) -> String {
    collector.gather_text()
}
