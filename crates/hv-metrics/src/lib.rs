//! Prometheus exporter bootstrap plus the metric names shared by the Haven
//! workers. Keeping the names here stops the binaries drifting apart.

use std::env;
use std::sync::OnceLock;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

pub const EMAILS_CLASSIFIED: &str = "haven_emails_classified_total";
pub const TASKS_CREATED: &str = "haven_tasks_created_total";
pub const ANALYSES_COMPLETED: &str = "haven_analyses_completed_total";
pub const ANALYSES_FAILED: &str = "haven_analyses_failed_total";
pub const ANALYSIS_CONFIDENCE: &str = "haven_analysis_confidence";
pub const ANALYSIS_COST_USD: &str = "haven_analysis_cost_usd";
pub const STALE_ANALYSES_RECLAIMED: &str = "haven_stale_analyses_reclaimed_total";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Start a Prometheus exporter on `0.0.0.0:<port>`, resolving the port from
/// the named environment variable with a fallback. Safe to call more than
/// once; later calls return the existing handle.
pub fn init_metrics(port_env: &str, default_port: u16) -> Option<&'static PrometheusHandle> {
    let port = env::var(port_env)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(default_port);

    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install_recorder()
    {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            info!(metrics_port = port, "started prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
    }
}

pub fn record_classified(category: &'static str) {
    counter!(EMAILS_CLASSIFIED, "category" => category).increment(1);
}

pub fn record_tasks_created(source: &'static str, count: u64) {
    if count > 0 {
        counter!(TASKS_CREATED, "source" => source).increment(count);
    }
}

pub fn record_analysis_completed(confidence: f64, cost_usd: f64) {
    counter!(ANALYSES_COMPLETED).increment(1);
    histogram!(ANALYSIS_CONFIDENCE).record(confidence);
    histogram!(ANALYSIS_COST_USD).record(cost_usd);
}

pub fn record_analysis_failed() {
    counter!(ANALYSES_FAILED).increment(1);
}

pub fn record_stale_reclaimed(count: u64) {
    if count > 0 {
        counter!(STALE_ANALYSES_RECLAIMED).increment(count);
    }
}
