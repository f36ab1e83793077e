//! Forest inference over a loaded artifact bundle

use super::output::format_estimate;
use super::validation::validate;
use super::DurationEstimator;
use crate::artifacts::ArtifactBundle;
use crate::contract::FieldValue;
use crate::errors::ValidationError;
use crate::models::{PredictionRequest, PredictionResult};
use crate::training::{mean, std_dev};
use ndarray::ArrayView1;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

/// Predictor backed by an immutable, shared artifact bundle
pub struct BundlePredictor {
    bundle: Arc<ArtifactBundle>,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl BundlePredictor {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self {
            bundle,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    pub fn bundle(&self) -> &Arc<ArtifactBundle> {
        &self.bundle
    }

    /// Estimate from values already in contract order. Categorical values
    /// go through the frozen encoders and may still be rejected.
    pub fn predict_values(&self, values: &[FieldValue]) -> Result<PredictionResult, ValidationError> {
        let encoded = self.bundle.contract.encode_row(values)?;
        let scaled = self.bundle.scaler.transform_row(ArrayView1::from(&encoded));

        let start = Instant::now();
        let outputs = self.bundle.model.tree_predictions(scaled.view());
        let raw = mean(&outputs);
        let dispersion = std_dev(&outputs);

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), raw_weeks = raw, "Inference completed");
        }

        Ok(format_estimate(raw, dispersion, self.bundle.bundle_id()))
    }

}

impl DurationEstimator for BundlePredictor {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ValidationError> {
        let values = validate(&self.bundle.contract, request)?;
        self.predict_values(&values)
    }

    fn bundle_id(&self) -> &str {
        self.bundle.bundle_id()
    }

    fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

/// Inference statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}
