//! Estimate post-processing
//!
//! Turns a raw forest output into a [`PredictionResult`]: clamping to the
//! plausible range, the dispersion-based interval, the month conversion
//! and the explanatory text.

use crate::models::{
    round1, ConfidenceInterval, PredictionResult, CONFIDENCE_LEVEL, PRECISION_NOTE,
    RECOMMENDATION_NOTE,
};

/// Shortest estimate returned, in weeks
pub const MIN_WEEKS: f64 = 1.0;

/// Longest estimate returned, in weeks (three years)
pub const MAX_WEEKS: f64 = 156.0;

pub const WEEKS_PER_MONTH: f64 = 4.345;

/// z-value for a 95% interval
pub const CONFIDENCE_Z: f64 = 1.96;

/// Upper bounds above this multiple of the estimate get capped
pub const CAP_TRIGGER: f64 = 2.0;

/// Multiple of the estimate a capped upper bound is set to
pub const CAP_FACTOR: f64 = 1.5;

/// Build the result for one forest output.
///
/// `dispersion` is the standard deviation of the individual tree outputs
/// for this one row. It is the spread across trees, not the deviation of
/// the single aggregated prediction, which would always be zero.
pub fn format_estimate(raw_weeks: f64, dispersion: f64, bundle_id: &str) -> PredictionResult {
    let weeks = clamp_weeks(raw_weeks);
    let interval = confidence_interval(weeks, dispersion);
    let months = months_from_weeks(weeks);

    PredictionResult {
        weeks,
        raw_weeks,
        months,
        interval,
        dispersion,
        message: format!(
            "La durée estimée de la formation est de {:.1} semaines ({:.1} mois)",
            round1(weeks),
            months
        ),
        precision: PRECISION_NOTE.to_string(),
        recommendation: RECOMMENDATION_NOTE.to_string(),
        bundle_id: bundle_id.to_string(),
    }
}

/// Clamp to the plausible range; NaN maps to the minimum
pub fn clamp_weeks(raw_weeks: f64) -> f64 {
    if raw_weeks.is_nan() {
        return MIN_WEEKS;
    }
    raw_weeks.clamp(MIN_WEEKS, MAX_WEEKS)
}

/// Heuristic interval: estimate ± z × dispersion, lower bound floored at
/// zero, upper bound capped when it runs past [`CAP_TRIGGER`] × estimate.
/// Not a statistically derived prediction interval.
pub fn confidence_interval(weeks: f64, dispersion: f64) -> ConfidenceInterval {
    let margin = dispersion.max(0.0) * CONFIDENCE_Z;
    let lower = (weeks - margin).max(0.0);
    let mut upper = weeks + margin;
    if upper > weeks * CAP_TRIGGER {
        upper = weeks * CAP_FACTOR;
    }

    ConfidenceInterval {
        lower,
        upper,
        level: CONFIDENCE_LEVEL,
    }
}

/// Weeks to months, rounded to the nearest half month with ties to even
pub fn months_from_weeks(weeks: f64) -> f64 {
    (weeks / WEEKS_PER_MONTH * 2.0).round_ties_even() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_clamped() {
        assert_eq!(format_estimate(-3.0, 0.0, "b").weeks, MIN_WEEKS);
        assert_eq!(format_estimate(400.0, 0.0, "b").weeks, MAX_WEEKS);
        assert_eq!(format_estimate(400.0, 0.0, "b").raw_weeks, 400.0);
        assert_eq!(format_estimate(52.0, 0.0, "b").weeks, 52.0);
        assert_eq!(clamp_weeks(f64::NAN), MIN_WEEKS);
    }

    #[test]
    fn test_interval_contains_estimate() {
        for (weeks, dispersion) in [(1.0, 0.0), (1.0, 5.0), (52.0, 3.0), (156.0, 40.0), (10.0, 100.0)] {
            let interval = confidence_interval(weeks, dispersion);
            assert!(interval.lower >= 0.0);
            assert!(interval.lower <= weeks, "{:?}", interval);
            assert!(interval.upper >= weeks, "{:?}", interval);
        }
    }

    #[test]
    fn test_wide_interval_capped() {
        // 10 + 1.96 * 6 = 21.76 > 20
        let interval = confidence_interval(10.0, 6.0);
        assert_eq!(interval.upper, 15.0);
        assert_eq!(interval.lower, 0.0);

        // 10 + 1.96 * 5 = 19.8 stays
        let interval = confidence_interval(10.0, 5.0);
        assert!((interval.upper - 19.8).abs() < 1e-9);
        assert!((interval.lower - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_interval_level() {
        assert_eq!(confidence_interval(52.0, 1.0).level, 95);
    }

    #[test]
    fn test_months_conversion() {
        assert_eq!(months_from_weeks(52.0), 12.0);
        assert_eq!(months_from_weeks(1.0), 0.0);
        assert_eq!(months_from_weeks(156.0), 36.0);
        assert_eq!(months_from_weeks(26.0), 6.0);
    }

    #[test]
    fn test_message() {
        let result = format_estimate(52.04, 2.0, "b");
        assert_eq!(
            result.message,
            "La durée estimée de la formation est de 52.0 semaines (12.0 mois)"
        );
        assert_eq!(result.precision, PRECISION_NOTE);
        assert_eq!(result.recommendation, RECOMMENDATION_NOTE);
    }

    #[test]
    fn test_message_uses_wire_rounding() {
        // 52.25 is exact in binary, so the tie goes to the even digit
        let result = format_estimate(52.25, 2.0, "b");
        assert!(
            result.message.contains("52.2 semaines"),
            "{}",
            result.message
        );
        assert_eq!(round1(result.weeks), 52.2);
    }
}
