//! Core data models for the duration estimator

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Confidence level reported with every interval, matching the 1.96 multiplier
pub const CONFIDENCE_LEVEL: u8 = 95;

pub const PRECISION_NOTE: &str = "Estimation basée sur les données historiques";
pub const RECOMMENDATION_NOTE: &str = "Cette estimation peut varier selon votre rythme d'apprentissage";
pub const FAILURE_MESSAGE: &str = "Erreur lors de la prédiction";

/// Raw prediction request: feature name to JSON value.
///
/// Kept untyped so that presence, type and range failures can each be
/// reported with their own message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    pub fields: Map<String, Value>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }
}

impl From<Map<String, Value>> for PredictionRequest {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Heuristic interval around the point estimate, in weeks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: u8,
}

/// Outcome of one successful estimate, before wire rounding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Point estimate clamped to the plausible range
    pub weeks: f64,
    /// Model output before clamping
    pub raw_weeks: f64,
    /// Weeks converted to months, to the nearest half month
    pub months: f64,
    pub interval: ConfidenceInterval,
    /// Spread of the individual tree outputs
    pub dispersion: f64,
    pub message: String,
    pub precision: String,
    pub recommendation: String,
    pub bundle_id: String,
}

/// Round to one decimal place, ties to even
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireInterval {
    pub minimum: f64,
    pub maximum: f64,
    pub niveau_confiance: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePrediction {
    pub duree_semaines: f64,
    pub duree_mois: f64,
    pub intervalle_confiance: WireInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDetails {
    pub precision: String,
    pub recommandation: String,
}

/// Success envelope returned by `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub prediction: WirePrediction,
    pub message: String,
    pub details: WireDetails,
}

impl From<&PredictionResult> for SuccessResponse {
    fn from(result: &PredictionResult) -> Self {
        Self {
            success: true,
            prediction: WirePrediction {
                duree_semaines: round1(result.weeks),
                duree_mois: result.months,
                intervalle_confiance: WireInterval {
                    minimum: round1(result.interval.lower),
                    maximum: round1(result.interval.upper),
                    niveau_confiance: result.interval.level,
                },
            },
            message: result.message.clone(),
            details: WireDetails {
                precision: result.precision.clone(),
                recommandation: result.recommendation.clone(),
            },
        }
    }
}

/// Failure envelope returned for any rejected request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Either envelope, as decoded by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Success(SuccessResponse),
    Failure(ErrorResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result() -> PredictionResult {
        PredictionResult {
            weeks: 52.349,
            raw_weeks: 52.349,
            months: 12.0,
            interval: ConfidenceInterval {
                lower: 47.0123,
                upper: 57.6877,
                level: CONFIDENCE_LEVEL,
            },
            dispersion: 2.72,
            message: "m".to_string(),
            precision: PRECISION_NOTE.to_string(),
            recommendation: RECOMMENDATION_NOTE.to_string(),
            bundle_id: "b".to_string(),
        }
    }

    #[test]
    fn test_success_wire_shape() {
        let wire = serde_json::to_value(SuccessResponse::from(&result())).unwrap();
        assert_eq!(
            wire,
            json!({
                "success": true,
                "prediction": {
                    "duree_semaines": 52.3,
                    "duree_mois": 12.0,
                    "intervalle_confiance": {"minimum": 47.0, "maximum": 57.7, "niveau_confiance": 95}
                },
                "message": "m",
                "details": {
                    "precision": "Estimation basée sur les données historiques",
                    "recommandation": "Cette estimation peut varier selon votre rythme d'apprentissage"
                }
            })
        );
    }

    #[test]
    fn test_wire_rounding_ties_to_even() {
        let tied = crate::predictor::format_estimate(52.25, 2.0, "b");

        let wire = SuccessResponse::from(&tied);
        assert_eq!(wire.prediction.duree_semaines, 52.2);
        assert!(wire.message.contains("52.2 semaines"), "{}", wire.message);
        assert_eq!(round1(0.25), 0.2);
        assert_eq!(round1(0.75), 0.8);
    }

    #[test]
    fn test_error_wire_shape() {
        let wire = serde_json::to_value(ErrorResponse::new("Le champ Âge est requis")).unwrap();
        assert_eq!(
            wire,
            json!({"success": false, "error": "Le champ Âge est requis", "message": "Erreur lors de la prédiction"})
        );
    }

    #[test]
    fn test_response_decodes_either_envelope() {
        let failure: PredictResponse =
            serde_json::from_value(json!({"success": false, "error": "x", "message": "y"})).unwrap();
        assert!(matches!(failure, PredictResponse::Failure(_)));

        let success: PredictResponse =
            serde_json::from_value(serde_json::to_value(SuccessResponse::from(&result())).unwrap()).unwrap();
        assert!(matches!(success, PredictResponse::Success(_)));
    }

    #[test]
    fn test_request_is_a_plain_object() {
        let request: PredictionRequest = serde_json::from_value(json!({"Âge": 30})).unwrap();
        assert_eq!(request.get("Âge"), Some(&json!(30)));
        assert!(serde_json::from_value::<PredictionRequest>(json!([1, 2])).is_err());
    }
}
