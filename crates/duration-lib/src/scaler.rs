//! Per-column standardization fit once over the training distribution

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Frozen `(x - mean) / std` transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    /// Population standard deviations; zero-variance columns store 1.0
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Compute column statistics over every row of the training matrix
    pub fn fit(features: ArrayView2<f64>) -> Option<Self> {
        if features.ncols() == 0 {
            return None;
        }
        let means = features.mean_axis(Axis(0))?;
        let scales = features
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });

        Some(Self {
            means: means.to_vec(),
            scales: scales.to_vec(),
        })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Scale one row with the stored statistics
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - &ArrayView1::from(&self.means)) / &ArrayView1::from(&self.scales)
    }

    pub fn transform(&self, features: ArrayView2<f64>) -> Array2<f64> {
        (&features - &ArrayView1::from(&self.means)) / &ArrayView1::from(&self.scales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn training_matrix() -> Array2<f64> {
        array![
            [20.0, 1.0, 5.0],
            [30.0, 2.0, 5.0],
            [40.0, 3.0, 5.0],
            [50.0, 4.0, 5.0],
        ]
    }

    #[test]
    fn test_fit_statistics() {
        let scaler = StandardScaler::fit(training_matrix().view()).unwrap();
        assert_eq!(scaler.width(), 3);
        assert!((scaler.means[0] - 35.0).abs() < 1e-12);
        assert!((scaler.scales[0] - 125.0_f64.sqrt()).abs() < 1e-12);
        // Constant column keeps unit scale
        assert_eq!(scaler.scales[2], 1.0);
    }

    #[test]
    fn test_single_row_matches_batch() {
        let rows = training_matrix();
        let scaler = StandardScaler::fit(rows.view()).unwrap();
        let batch = scaler.transform(rows.view());
        assert_eq!(scaler.transform_row(rows.row(2)), batch.row(2));
    }

    #[test]
    fn test_transform_does_not_refit() {
        let scaler = StandardScaler::fit(training_matrix().view()).unwrap();
        let before = scaler.clone();
        let scaled = scaler.transform_row(array![99.0, 9.0, 1.0].view());
        assert_eq!(scaler, before);
        assert!(scaled[0] > 0.0);
        assert_eq!(scaled[2], -4.0);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(StandardScaler::fit(Array2::<f64>::zeros((0, 3)).view()).is_none());
        assert!(StandardScaler::fit(Array2::<f64>::zeros((4, 0)).view()).is_none());
    }
}
