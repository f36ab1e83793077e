//! Exhaustive hyperparameter search with k-fold cross-validation
//!
//! Grid points are scored in parallel; scores are negative mean squared
//! error, so higher is better. Ties keep the earliest grid point.

use super::evaluation::{mean, mean_squared_error, std_dev};
use super::split::{k_fold, select};
use crate::errors::TrainingError;
use crate::forest::{ForestParams, MaxFeatures, RandomForest};
use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Candidate values per hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![10, 15],
            min_samples_split: vec![5],
            min_samples_leaf: vec![2],
            max_features: vec![MaxFeatures::Sqrt],
        }
    }
}

impl ParamGrid {
    /// Cartesian product, keys in alphabetical order with the last varying fastest
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::new();
        for &max_depth in &self.max_depth {
            for &max_features in &self.max_features {
                for &min_samples_leaf in &self.min_samples_leaf {
                    for &min_samples_split in &self.min_samples_split {
                        for &n_estimators in &self.n_estimators {
                            out.push(ForestParams {
                                n_estimators,
                                max_depth,
                                min_samples_split,
                                min_samples_leaf,
                                max_features,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

/// Cross-validated score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    /// Mean negative MSE across folds
    pub mean_score: f64,
    pub std_score: f64,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: ForestParams,
    pub best_score: f64,
    /// Every grid point, in grid order
    pub leaderboard: Vec<CandidateScore>,
}

/// Per-fold MSE of `params` refit on each training fold
pub fn cross_validate_mse(
    features: ArrayView2<f64>,
    targets: &[f64],
    params: ForestParams,
    folds: usize,
    seed: u64,
) -> Result<Vec<f64>, TrainingError> {
    k_fold(features.nrows(), folds)?
        .iter()
        .map(|fold| {
            let (train_x, train_y) = select(features, targets, &fold.train);
            let (test_x, test_y) = select(features, targets, &fold.test);
            let model = RandomForest::fit(train_x.view(), &train_y, params, seed)?;
            Ok(mean_squared_error(&test_y, &model.predict(test_x.view())))
        })
        .collect()
}

pub struct GridSearch {
    grid: ParamGrid,
    folds: usize,
    seed: u64,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize, seed: u64) -> Self {
        Self { grid, folds, seed }
    }

    pub fn run(&self, features: ArrayView2<f64>, targets: &[f64]) -> Result<SearchOutcome, TrainingError> {
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(TrainingError::InsufficientData(
                "hyperparameter grid is empty".to_string(),
            ));
        }

        let leaderboard = candidates
            .into_par_iter()
            .map(|params| {
                let mse = cross_validate_mse(features, targets, params, self.folds, self.seed)?;
                let fold_scores: Vec<f64> = mse.iter().map(|m| -m).collect();
                let score = CandidateScore {
                    params,
                    mean_score: mean(&fold_scores),
                    std_score: std_dev(&fold_scores),
                    fold_scores,
                };
                debug!(params = %params, mean_score = score.mean_score, "Scored grid point");
                Ok(score)
            })
            .collect::<Result<Vec<_>, TrainingError>>()?;

        let mut best = 0;
        for (idx, candidate) in leaderboard.iter().enumerate().skip(1) {
            if candidate.mean_score > leaderboard[best].mean_score {
                best = idx;
            }
        }

        Ok(SearchOutcome {
            best: leaderboard[best].params,
            best_score: leaderboard[best].mean_score,
            leaderboard,
        })
    }
}
