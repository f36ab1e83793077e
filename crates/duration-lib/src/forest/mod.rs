//! Bagged regression trees
//!
//! Each tree is grown on a bootstrap sample with its own RNG, seeded from a
//! single base seed, so the fitted forest does not depend on how rayon
//! schedules the work.

mod tree;

pub use tree::{Node, RegressionTree, TreeParams};

use crate::errors::TrainingError;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    Sqrt,
    All,
}

impl MaxFeatures {
    pub fn resolve(self, feature_count: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => ((feature_count as f64).sqrt() as usize).max(1),
            MaxFeatures::All => feature_count.max(1),
        }
    }
}

/// Hyperparameters of one forest configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_estimators={} max_depth={} min_samples_split={} min_samples_leaf={} max_features={:?}",
            self.n_estimators, self.max_depth, self.min_samples_split, self.min_samples_leaf, self.max_features
        )
    }
}

/// Random forest regressor over a scaled feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    pub feature_count: usize,
    pub seed: u64,
    pub trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit<'a>(
        features: ArrayView2<'a, f64>,
        targets: &'a [f64],
        params: ForestParams,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        if features.nrows() == 0 || features.nrows() != targets.len() {
            return Err(TrainingError::InsufficientData(format!(
                "cannot fit forest on {} rows and {} targets",
                features.nrows(),
                targets.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(TrainingError::InsufficientData(
                "forest needs at least one tree".to_string(),
            ));
        }

        let feature_count = features.ncols();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(feature_count),
        };

        let mut seeder = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..params.n_estimators).map(|_| seeder.gen()).collect();
        let n = features.nrows();

        let trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(features, targets, &bootstrap, tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            params,
            feature_count,
            seed,
            trees,
        })
    }

    /// Mean of the tree outputs
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let outputs = self.tree_predictions(row);
        outputs.iter().sum::<f64>() / outputs.len().max(1) as f64
    }

    pub fn predict(&self, features: ArrayView2<f64>) -> Vec<f64> {
        features.outer_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Individual tree outputs, in tree order
    pub fn tree_predictions(&self, row: ArrayView1<f64>) -> Vec<f64> {
        self.trees.iter().map(|t| t.predict(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn linear_data(n: usize) -> (Array2<f64>, Vec<f64>) {
        let features = Array2::from_shape_fn((n, 4), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 7) as f64,
            2 => (i % 3) as f64,
            _ => 1.0,
        });
        let targets = features.column(0).iter().map(|x| 2.0 * x + 5.0).collect();
        (features, targets)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 20,
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(7), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
    }

    #[test]
    fn test_fit_tracks_trend() {
        let (features, targets) = linear_data(80);
        let forest = RandomForest::fit(features.view(), &targets, small_params(), 42).unwrap();

        assert_eq!(forest.trees.len(), 20);
        assert_eq!(forest.feature_count, 4);
        let low = forest.predict_row(array![10.0, 3.0, 1.0, 1.0].view());
        let high = forest.predict_row(array![70.0, 0.0, 1.0, 1.0].view());
        assert!(low < high, "low={} high={}", low, high);
        assert!((low - 25.0).abs() < 10.0, "low={}", low);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let (features, targets) = linear_data(60);
        let a = RandomForest::fit(features.view(), &targets, small_params(), 7).unwrap();
        let b = RandomForest::fit(features.view(), &targets, small_params(), 7).unwrap();
        assert_eq!(a, b);

        let c = RandomForest::fit(features.view(), &targets, small_params(), 8).unwrap();
        assert_ne!(a.trees, c.trees);
    }

    #[test]
    fn test_dispersion_is_non_negative() {
        let (features, targets) = linear_data(60);
        let forest = RandomForest::fit(features.view(), &targets, small_params(), 3).unwrap();
        let row = features.row(30);
        let outputs = forest.tree_predictions(row);
        let spread = crate::training::std_dev(&outputs);
        assert!(spread >= 0.0);

        let min = outputs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = outputs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(spread <= max - min + 1e-9);
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(RandomForest::fit(Array2::<f64>::zeros((0, 4)).view(), &[], small_params(), 1).is_err());
        let (features, targets) = linear_data(5);
        let mut params = small_params();
        params.n_estimators = 0;
        assert!(RandomForest::fit(features.view(), &targets, params, 1).is_err());
    }
}
