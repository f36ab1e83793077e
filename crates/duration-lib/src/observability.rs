//! Observability infrastructure for the duration estimator
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction and rejection counts, bundle info)
//! - Structured JSON logging with tracing

use crate::forest::ForestParams;
use crate::training::EvaluationReport;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EstimatorMetricsInner> = OnceLock::new();

struct EstimatorMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    validation_failures_total: IntCounterVec,
    prediction_errors_total: IntCounter,
    bundle_info: GaugeVec,
}

impl EstimatorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "duration_estimator_prediction_latency_seconds",
                "Time spent validating, encoding and evaluating one request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "duration_estimator_predictions_total",
                "Total number of estimates returned"
            )
            .expect("Failed to register predictions_total"),

            validation_failures_total: register_int_counter_vec!(
                "duration_estimator_validation_failures_total",
                "Requests rejected before reaching the model, by field",
                &["field"]
            )
            .expect("Failed to register validation_failures_total"),

            prediction_errors_total: register_int_counter!(
                "duration_estimator_prediction_errors_total",
                "Requests that failed for reasons other than validation"
            )
            .expect("Failed to register prediction_errors_total"),

            bundle_info: register_gauge_vec!(
                "duration_estimator_bundle_info",
                "Information about the loaded artifact bundle",
                &["bundle_id", "trees"]
            )
            .expect("Failed to register bundle_info"),
        }
    }
}

/// Estimator metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EstimatorMetrics {
    _private: (),
}

impl Default for EstimatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EstimatorMetricsInner {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_validation_failures(&self, field: &str) {
        self.inner()
            .validation_failures_total
            .with_label_values(&[field])
            .inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    /// Replace the bundle info series with the given bundle
    pub fn set_bundle_info(&self, bundle_id: &str, trees: usize) {
        self.inner().bundle_info.reset();
        self.inner()
            .bundle_info
            .with_label_values(&[bundle_id, &trees.to_string()])
            .set(1.0);
    }
}

/// Structured logger for estimator events
///
/// Every record carries an `event` tag and the instance name so log
/// pipelines can filter on them.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, bundle_id: &str, port: u16) {
        info!(
            event = "estimator_started",
            instance = %self.instance,
            version = %version,
            bundle_id = %bundle_id,
            port = port,
            "Duration estimator started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "estimator_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Duration estimator shutting down"
        );
    }

    pub fn log_bundle_loaded(&self, bundle_id: &str, path: &str, trees: usize, features: usize) {
        info!(
            event = "bundle_loaded",
            instance = %self.instance,
            bundle_id = %bundle_id,
            path = %path,
            trees = trees,
            features = features,
            "Artifact bundle loaded"
        );
    }

    pub fn log_prediction(
        &self,
        bundle_id: &str,
        weeks: f64,
        lower: f64,
        upper: f64,
        months: f64,
        latency_secs: f64,
    ) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            bundle_id = %bundle_id,
            weeks = weeks,
            lower_weeks = lower,
            upper_weeks = upper,
            months = months,
            latency_secs = latency_secs,
            "Generated duration estimate"
        );
    }

    pub fn log_rejection(&self, field: &str, reason: &str) {
        warn!(
            event = "prediction_rejected",
            instance = %self.instance,
            field = %field,
            reason = %reason,
            "Prediction request rejected"
        );
    }

    pub fn log_prediction_failure(&self, reason: &str) {
        error!(
            event = "prediction_failed",
            instance = %self.instance,
            reason = %reason,
            "Prediction failed"
        );
    }

    pub fn log_training_completed(
        &self,
        bundle_id: &str,
        rows: usize,
        params: &ForestParams,
        evaluation: &EvaluationReport,
    ) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            bundle_id = %bundle_id,
            rows = rows,
            params = %params,
            rmse = evaluation.rmse,
            mae = evaluation.mae,
            r2 = evaluation.r2_score,
            rmse_cv_mean = evaluation.rmse_cv_mean,
            rmse_cv_std = evaluation.rmse_cv_std,
            margin = evaluation.confidence_interval,
            "Training run completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_metrics_creation() {
        let metrics = EstimatorMetrics::new();

        metrics.observe_prediction_latency(0.0004);
        metrics.inc_predictions();
        metrics.inc_validation_failures("Âge");
        metrics.inc_prediction_errors();

        // A second handle shares the registered metrics
        EstimatorMetrics::new().inc_predictions();
    }

    #[test]
    fn test_bundle_info_keeps_single_series() {
        let metrics = EstimatorMetrics::new();
        metrics.set_bundle_info("first", 10);
        metrics.set_bundle_info("second", 20);

        let families = prometheus::gather();
        let info = families
            .iter()
            .find(|f| f.get_name() == "duration_estimator_bundle_info")
            .unwrap();
        assert_eq!(info.get_metric().len(), 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance(), "test-instance");
    }
}
