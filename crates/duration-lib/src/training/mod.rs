//! Offline training pipeline
//!
//! Loads historical records, freezes the encoders and the scaler, searches
//! the hyperparameter grid with k-fold cross-validation, refits the best
//! configuration on the training partition and evaluates it on the
//! held-out partition. The result is an [`ArtifactBundle`] and a report.
//! Any failure aborts the run before anything is written.

mod dataset;
mod evaluation;
mod search;
mod split;

pub use dataset::{sample_dataset, Dataset};
pub use evaluation::{
    mean, mean_absolute_error, mean_squared_error, r2_score, residual_margin, std_dev,
    EvaluationReport, MARGIN_Z,
};
pub use search::{cross_validate_mse, CandidateScore, GridSearch, ParamGrid, SearchOutcome};
pub use split::{k_fold, train_test_split, Split};

use crate::artifacts::ArtifactBundle;
use crate::contract::FeatureContract;
use crate::errors::TrainingError;
use crate::forest::{ForestParams, RandomForest};
use crate::observability::StructuredLogger;
use crate::scaler::StandardScaler;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub seed: u64,
    /// Share of rows held out for the final report
    pub test_fraction: f64,
    /// Folds used to score each grid point
    pub search_folds: usize,
    /// Folds used for the held-out cross-validated RMSE
    pub report_folds: usize,
    pub grid: ParamGrid,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            search_folds: 5,
            report_folds: 10,
            grid: ParamGrid::default(),
        }
    }
}

/// Summary of a training run, persisted in the bundle manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub seed: u64,
    pub best_params: ForestParams,
    /// Mean negative MSE of the best grid point
    pub best_score: f64,
    pub leaderboard: Vec<CandidateScore>,
    pub evaluation: EvaluationReport,
    pub duration_secs: f64,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    logger: StructuredLogger,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            logger: StructuredLogger::new("trainer"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn run(&self, dataset: &Dataset) -> Result<(ArtifactBundle, TrainingReport), TrainingError> {
        let started = Instant::now();
        let config = &self.config;

        let mut contract = FeatureContract::canonical();
        contract
            .fit_encoders(|name| dataset.categorical_values(name))
            .map_err(|source| {
                let row = dataset
                    .categorical_values(&source.feature)
                    .iter()
                    .position(|v| *v == source.value)
                    .map_or(0, |idx| idx + 1);
                TrainingError::UnknownCategory { row, source }
            })?;

        let encoded = dataset.encode(&contract)?;
        let scaler = StandardScaler::fit(encoded.view())
            .ok_or_else(|| TrainingError::InsufficientData("cannot fit scaler on an empty matrix".to_string()))?;
        let scaled = scaler.transform(encoded.view());

        let partition = train_test_split(scaled.nrows(), config.test_fraction, config.seed)?;
        let (train_x, train_y) = split::select(scaled.view(), &dataset.targets, &partition.train);
        let (test_x, test_y) = split::select(scaled.view(), &dataset.targets, &partition.test);
        info!(
            rows = dataset.len(),
            train_rows = train_x.nrows(),
            test_rows = test_x.nrows(),
            "Dataset encoded and split"
        );

        let outcome = GridSearch::new(config.grid.clone(), config.search_folds, config.seed).run(train_x.view(), &train_y)?;
        info!(params = %outcome.best, score = outcome.best_score, "Selected hyperparameters");

        let model = RandomForest::fit(train_x.view(), &train_y, outcome.best, config.seed)?;
        let evaluation = self.evaluate(&model, outcome.best, test_x.view(), &test_y)?;

        let report = TrainingReport {
            rows: dataset.len(),
            train_rows: train_x.nrows(),
            seed: config.seed,
            best_params: outcome.best,
            best_score: outcome.best_score,
            leaderboard: outcome.leaderboard,
            evaluation,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        let bundle = ArtifactBundle::new(contract, scaler, model, Some(report.clone()))?;

        self.logger
            .log_training_completed(bundle.bundle_id(), report.rows, &report.best_params, &report.evaluation);

        Ok((bundle, report))
    }

    /// Cross-validated RMSE on the held-out rows plus point metrics of the
    /// refit model on the same rows
    fn evaluate(
        &self,
        model: &RandomForest,
        params: ForestParams,
        test_x: ArrayView2<f64>,
        test_y: &[f64],
    ) -> Result<EvaluationReport, TrainingError> {
        let folds = self.config.report_folds.min(test_x.nrows());
        if folds < 2 {
            return Err(TrainingError::InsufficientData(format!(
                "{} held-out rows are too few to evaluate",
                test_x.nrows()
            )));
        }

        let rmse_folds: Vec<f64> = cross_validate_mse(test_x, test_y, params, folds, self.config.seed)?
            .into_iter()
            .map(f64::sqrt)
            .collect();
        debug!(folds = folds, rmse = ?rmse_folds, "Held-out cross-validation");

        let predicted = model.predict(test_x);
        let mse = mean_squared_error(test_y, &predicted);

        Ok(EvaluationReport {
            rmse_cv_mean: mean(&rmse_folds),
            rmse_cv_std: std_dev(&rmse_folds),
            r2_score: r2_score(test_y, &predicted),
            rmse: mse.sqrt(),
            mae: mean_absolute_error(test_y, &predicted),
            confidence_interval: residual_margin(test_y, &predicted),
            cv_folds: folds,
            held_out_rows: test_x.nrows(),
        })
    }
}

/// Load `csv_path`, train, and write the bundle to `output`
pub fn train_from_csv(
    csv_path: &Path,
    output: &Path,
    config: TrainingConfig,
) -> Result<(ArtifactBundle, TrainingReport), TrainingError> {
    let dataset = Dataset::from_csv(csv_path, &FeatureContract::canonical())?;
    let (bundle, report) = TrainingPipeline::new(config).run(&dataset)?;
    bundle.save(output)?;
    Ok((bundle, report))
}
