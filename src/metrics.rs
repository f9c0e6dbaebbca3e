//! Metrics for the cleaning pipeline.
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op, so the CLI pays nothing unless `serve` installs the
//! Prometheus exporter.

use crate::types::Provenance;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// All metric names used by the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RowsProcessed,
    ValidationCalls,
    ValidationFailures,
    ValidationDuration,
    CheckpointWrites,
    CheckpointDuration,
    RunsCompleted,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RowsProcessed => "prospect_rows_processed_total",
            MetricName::ValidationCalls => "prospect_validation_calls_total",
            MetricName::ValidationFailures => "prospect_validation_failures_total",
            MetricName::ValidationDuration => "prospect_validation_duration_seconds",
            MetricName::CheckpointWrites => "prospect_checkpoint_writes_total",
            MetricName::CheckpointDuration => "prospect_checkpoint_duration_seconds",
            MetricName::RunsCompleted => "prospect_runs_completed_total",
        }
    }
}

/// Install the Prometheus recorder and return the handle used to render `/metrics`.
pub fn init() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

pub fn row_processed(name: Provenance, company: Provenance) {
    ::metrics::counter!(
        MetricName::RowsProcessed.as_str(),
        "name" => name.as_str(),
        "company" => company.as_str()
    )
    .increment(1);
}

pub fn validation_call(validator: &'static str, duration_secs: f64) {
    ::metrics::counter!(MetricName::ValidationCalls.as_str(), "validator" => validator).increment(1);
    ::metrics::histogram!(MetricName::ValidationDuration.as_str(), "validator" => validator)
        .record(duration_secs);
}

pub fn validation_failure(validator: &'static str) {
    ::metrics::counter!(MetricName::ValidationFailures.as_str(), "validator" => validator)
        .increment(1);
}

pub fn checkpoint_written(kind: &'static str, duration_secs: f64) {
    ::metrics::counter!(MetricName::CheckpointWrites.as_str(), "kind" => kind).increment(1);
    ::metrics::histogram!(MetricName::CheckpointDuration.as_str()).record(duration_secs);
}

pub fn run_completed() {
    ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
}
