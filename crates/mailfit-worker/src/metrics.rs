//! Worker metrics.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Metric names, kept in one place so code and dashboards agree.
pub mod names {
    pub const JOBS_CONSUMED_TOTAL: &str = "mailfit_jobs_consumed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "mailfit_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "mailfit_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "mailfit_job_duration_seconds";
    pub const ENCODE_DURATION_SECONDS: &str = "mailfit_encode_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "mailfit_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "mailfit_upload_duration_seconds";
    pub const TERMINAL_WRITE_FAILURES_TOTAL: &str = "mailfit_terminal_write_failures_total";
    pub const QUEUE_DEPTH: &str = "mailfit_queue_depth";
}

pub fn record_job_consumed() {
    counter!(names::JOBS_CONSUMED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "done").record(duration_secs);
}

pub fn record_job_failed(duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "error").record(duration_secs);
}

pub fn record_encode(duration_secs: f64, success: bool) {
    let outcome = if success { "ok" } else { "err" };
    histogram!(names::ENCODE_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn record_download(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_upload(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_terminal_write_failure(operation: &'static str) {
    counter!(names::TERMINAL_WRITE_FAILURES_TOTAL, "operation" => operation).increment(1);
}

pub fn record_queue_depth(depth: u64) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}

/// Install the Prometheus scrape endpoint on `addr`.
///
/// Failure to bind degrades to a warning; the worker is useful without
/// metrics.
pub fn install_exporter(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!("Prometheus metrics exposed on {}", addr),
        Err(e) => warn!("Failed to install Prometheus exporter on {}: {}", addr, e),
    }
}
