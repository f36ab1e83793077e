//! Regression metrics for the held-out report

use serde::{Deserialize, Serialize};

/// z-value used for the residual margin of error
pub const MARGIN_Z: f64 = 1.96;

/// Held-out evaluation of the selected configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rmse_cv_mean: f64,
    pub rmse_cv_std: f64,
    pub r2_score: f64,
    pub rmse: f64,
    pub mae: f64,
    /// 1.96 × standard deviation of residuals
    pub confidence_interval: f64,
    pub cv_folds: usize,
    pub held_out_rows: usize,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let squared: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).collect();
    mean(&squared)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let abs: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).collect();
    mean(&abs)
}

/// Coefficient of determination. A constant target scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let m = mean(actual);
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - m).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Residual margin of error at ~95% coverage, assuming normal residuals
pub fn residual_margin(actual: &[f64], predicted: &[f64]) -> f64 {
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    std_dev(&residuals) * MARGIN_Z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metrics() {
        let actual = [3.0, -0.5, 2.0, 7.0];
        let predicted = [2.5, 0.0, 2.0, 8.0];
        assert!((mean_squared_error(&actual, &predicted) - 0.375).abs() < 1e-12);
        assert!((mean_absolute_error(&actual, &predicted) - 0.5).abs() < 1e-12);
        assert!((r2_score(&actual, &predicted) - 0.948_608_137).abs() < 1e-6);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
    }

    #[test]
    fn test_residual_margin() {
        // Residuals 1, -1, 1, -1 have population std 1
        let actual = [2.0, 0.0, 2.0, 0.0];
        let predicted = [1.0, 1.0, 1.0, 1.0];
        assert!((residual_margin(&actual, &predicted) - 1.96).abs() < 1e-12);
    }

    #[test]
    fn test_std_dev_population() {
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
        assert_eq!(std_dev(&[]), 0.0);
    }
}
