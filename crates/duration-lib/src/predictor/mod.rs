//! Online inference pipeline

mod inference;
mod output;
mod validation;

pub use inference::{BundlePredictor, InferenceStats};
pub use output::{
    clamp_weeks, confidence_interval, format_estimate, months_from_weeks, CAP_FACTOR, CAP_TRIGGER,
    CONFIDENCE_Z, MAX_WEEKS, MIN_WEEKS, WEEKS_PER_MONTH,
};
pub use validation::validate;

use crate::errors::ValidationError;
use crate::models::{PredictionRequest, PredictionResult};

/// Trait for prediction implementations
pub trait DurationEstimator: Send + Sync {
    /// Validate the request, then estimate its training duration. A request
    /// that fails validation never reaches the model.
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ValidationError>;

    /// Identifier of the artifact bundle behind the estimates
    fn bundle_id(&self) -> &str;

    /// Counters of estimates that reached the model
    fn stats(&self) -> InferenceStats;
}
