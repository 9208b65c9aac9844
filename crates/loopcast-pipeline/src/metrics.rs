//! Prometheus metrics for assembly runs.
//!
//! Without an installed recorder every call here is a no-op, so library
//! users and tests pay nothing. The CLI installs a recorder and dumps the
//! exposition text to a file after the run.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::path::Path;

use crate::error::Stage;

/// Install the Prometheus recorder.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_RUNS_TOTAL: &str = "loopcast_stage_runs_total";
    pub const STAGE_FAILURES_TOTAL: &str = "loopcast_stage_failures_total";
    pub const STAGE_DURATION_SECONDS: &str = "loopcast_stage_duration_seconds";
    pub const RUNS_TOTAL: &str = "loopcast_runs_total";
    pub const OUTPUT_DURATION_SECONDS: &str = "loopcast_output_duration_seconds";
}

/// Record one completed stage invocation.
pub fn record_stage(stage: Stage, duration_secs: f64, success: bool) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::STAGE_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
    if !success {
        counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
    }
}

/// Record a finished run; `outcome` is `success`, `failed` or `cancelled`.
pub fn record_run(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
}

/// Record the realized duration of a published artifact.
pub fn record_output_duration(duration_secs: f64) {
    histogram!(names::OUTPUT_DURATION_SECONDS).record(duration_secs);
}

/// Write the rendered exposition text (node-exporter textfile style).
pub async fn write_metrics_file(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    tokio::fs::write(path, handle.render()).await
}
