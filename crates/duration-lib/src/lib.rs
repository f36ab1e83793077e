//! Training duration estimation
//!
//! This crate provides the core functionality for:
//! - The feature contract and its frozen categorical encoders
//! - Standard scaling and a random forest regressor
//! - The offline training pipeline and artifact bundles
//! - The online inference pipeline
//! - Health checks and observability

pub mod artifacts;
pub mod contract;
pub mod encoder;
pub mod errors;
pub mod forest;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod scaler;
pub mod training;

pub use artifacts::{ArtifactBundle, BundleManifest};
pub use contract::{FeatureContract, FeatureKind, FeatureSpec, FieldValue};
pub use encoder::CategoricalEncoder;
pub use errors::{ArtifactLoadError, TrainingError, UnknownCategoryError, ValidationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EstimatorMetrics, StructuredLogger};
pub use predictor::{BundlePredictor, DurationEstimator, InferenceStats};
pub use training::{TrainingConfig, TrainingPipeline, TrainingReport};
