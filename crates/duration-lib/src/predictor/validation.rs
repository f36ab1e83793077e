//! Request validation against the feature contract
//!
//! Checks run in four passes and the first failure wins: presence of every
//! feature, numeric type, numeric bounds, then categorical membership.

use crate::contract::{FeatureContract, FeatureKind, FieldValue};
use crate::errors::{UnknownCategoryError, ValidationError};
use crate::models::PredictionRequest;
use serde_json::Value;

/// Validate `request` and return its values in contract order
pub fn validate(contract: &FeatureContract, request: &PredictionRequest) -> Result<Vec<FieldValue>, ValidationError> {
    let mut raw = Vec::with_capacity(contract.len());
    for spec in &contract.features {
        match request.get(&spec.name) {
            Some(value) if !value.is_null() => raw.push(value),
            _ => {
                return Err(ValidationError::MissingField {
                    field: spec.name.clone(),
                })
            }
        }
    }

    let mut numbers = vec![None; contract.len()];
    for (idx, (spec, value)) in contract.features.iter().zip(&raw).enumerate() {
        if let FeatureKind::Numeric { .. } = spec.kind {
            // Booleans are not numbers here even though some clients coerce them
            let number = match value {
                Value::Number(n) => n.as_f64(),
                _ => None,
            };
            numbers[idx] = Some(number.ok_or_else(|| ValidationError::NotNumeric {
                field: spec.name.clone(),
            })?);
        }
    }

    for (spec, number) in contract.features.iter().zip(&numbers) {
        if let (FeatureKind::Numeric { min, max, rule }, Some(value)) = (&spec.kind, number) {
            if value < min || value > max {
                return Err(ValidationError::OutOfRange {
                    field: spec.name.clone(),
                    value: *value,
                    min: *min,
                    max: *max,
                    message: rule.clone(),
                });
            }
        }
    }

    let mut values = Vec::with_capacity(contract.len());
    for ((spec, value), number) in contract.features.iter().zip(&raw).zip(&numbers) {
        match &spec.kind {
            FeatureKind::Numeric { .. } => {
                let number = number.ok_or_else(|| ValidationError::NotNumeric {
                    field: spec.name.clone(),
                })?;
                values.push(FieldValue::Number(number));
            }
            FeatureKind::Categorical { vocabulary, rule } => {
                let text = value.as_str().ok_or_else(|| ValidationError::NotText {
                    field: spec.name.clone(),
                })?;
                if !vocabulary.iter().any(|v| v == text) {
                    return Err(UnknownCategoryError {
                        feature: spec.name.clone(),
                        value: text.to_string(),
                        rule: rule.clone(),
                        allowed: vocabulary.clone(),
                    }
                    .into());
                }
                values.push(FieldValue::Text(text.to_string()));
            }
        }
    }

    Ok(values)
}
