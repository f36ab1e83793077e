//! Seeded hold-out split and contiguous k-fold partitioning

use crate::errors::TrainingError;
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of one partition pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(test_fraction * n)` rows
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split, TrainingError> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(TrainingError::InsufficientData(format!(
            "test fraction {} must be in (0, 1)",
            test_fraction
        )));
    }
    let test_len = (test_fraction * n as f64).ceil() as usize;
    if test_len == 0 || test_len >= n {
        return Err(TrainingError::InsufficientData(format!(
            "{} rows cannot be split with test fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(test_len);

    Ok(Split { train, test: indices })
}

/// Unshuffled folds; the first `n % k` folds get one extra row
pub fn k_fold(n: usize, k: usize) -> Result<Vec<Split>, TrainingError> {
    if k < 2 || k > n {
        return Err(TrainingError::InsufficientData(format!(
            "cannot make {} folds from {} rows",
            k, n
        )));
    }

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;

    for fold in 0..k {
        let len = base + usize::from(fold < extra);
        let end = start + len;
        folds.push(Split {
            train: (0..start).chain(end..n).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }

    Ok(folds)
}

/// Gather the listed rows of a matrix and its targets
pub fn select(features: ArrayView2<f64>, targets: &[f64], rows: &[usize]) -> (Array2<f64>, Vec<f64>) {
    let x = features.select(Axis(0), rows);
    let y = rows.iter().map(|&i| targets[i]).collect();
    (x, y)
}
