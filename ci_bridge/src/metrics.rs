//! Prometheus metrics for bridge observability.

use std::net::SocketAddr;

use metrics::{counter, histogram};

/// Install the Prometheus exporter when a listen address is configured.
pub fn init_metrics(addr: Option<SocketAddr>) {
    let Some(addr) = addr else {
        return;
    };
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record events added to the backlog by a feed fetch.
pub fn events_fetched(count: usize) {
    counter!("bridge_events_fetched_total").increment(count as u64);
}

/// Record a conditional fetch answered with "not modified".
pub fn feed_not_modified() {
    counter!("bridge_feed_not_modified_total").increment(1);
}

/// Record a Jenkins job start.
pub fn job_triggered(job: &str) {
    counter!("bridge_jobs_triggered_total", "job" => job.to_string()).increment(1);
}

/// Record one build result poll and the state it produced.
pub fn poll_tick(state: &str) {
    counter!("bridge_poll_ticks_total", "state" => state.to_string()).increment(1);
}

/// Record a runservice re-run request.
pub fn remediation_requested() {
    counter!("bridge_remediations_total").increment(1);
}

/// Record a finished build-mode run.
pub fn build_finished(outcome: &str, ticks: u32) {
    counter!("bridge_builds_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("bridge_build_poll_ticks").record(ticks as f64);
}

/// Record a commit status update.
pub fn status_posted(state: &str) {
    counter!("bridge_status_updates_total", "state" => state.to_string()).increment(1);
}
