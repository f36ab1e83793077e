//! Feature contract shared by training and inference
//!
//! The contract fixes the column order of the scaled feature matrix, the
//! validation rules applied to requests and the frozen categorical
//! encoders. Training writes it into the artifact bundle; inference reads
//! it back unchanged. Any drift in order or membership silently moves
//! values into the wrong column, so consistency is checked on load.

use crate::encoder::CategoricalEncoder;
use crate::errors::{UnknownCategoryError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const AGE: &str = "Âge";
pub const EDUCATION_LEVEL: &str = "Niveau_Éducation";
pub const TRAINING_EXPERIENCE: &str = "Expérience_Formation";
pub const WEEKLY_STUDY_HOURS: &str = "Heures_Étude_Par_Semaine";
pub const PRIOR_AVERAGE_GRADE: &str = "Note_Moyenne_Antérieure";
pub const DIFFICULTY: &str = "Difficulté_Formation";
pub const PLANNED_WEEKS: &str = "Durée_Formation_Prévue";

/// Realized duration in weeks, the training target
pub const TARGET_COLUMN: &str = "Durée_Formation_Réelle";

pub const EDUCATION_LEVELS: [&str; 5] = ["Bac", "Bac+2", "Bac+3", "Bac+5", "Doctorat"];
pub const DIFFICULTY_LEVELS: [&str; 3] = ["Facile", "Moyen", "Difficile"];

/// How a feature is typed on the wire and constrained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureKind {
    /// Inclusive bounds, with the sentence reported when violated
    Numeric { min: f64, max: f64, rule: String },
    /// Allowed values in display order
    Categorical { vocabulary: Vec<String>, rule: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl FeatureSpec {
    fn numeric(name: &str, min: f64, max: f64, rule: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FeatureKind::Numeric {
                min,
                max,
                rule: rule.to_string(),
            },
        }
    }

    fn categorical(name: &str, vocabulary: &[&str], rule: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FeatureKind::Categorical {
                vocabulary: vocabulary.iter().map(|v| v.to_string()).collect(),
                rule: rule.to_string(),
            },
        }
    }
}

/// A raw value before encoding, as read from a dataset row or a request
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// Ordered feature list plus the encoders fit at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContract {
    pub features: Vec<FeatureSpec>,
    pub target: String,
    #[serde(default)]
    pub encoders: Vec<CategoricalEncoder>,
}

impl FeatureContract {
    /// The canonical contract, before any encoder has been fit
    pub fn canonical() -> Self {
        Self {
            features: vec![
                FeatureSpec::numeric(AGE, 16.0, 100.0, "L'âge doit être compris entre 16 et 100 ans"),
                FeatureSpec::categorical(
                    EDUCATION_LEVEL,
                    &EDUCATION_LEVELS,
                    "Le niveau d'éducation doit être l'un des suivants",
                ),
                FeatureSpec::numeric(
                    TRAINING_EXPERIENCE,
                    0.0,
                    50.0,
                    "L'expérience en formation doit être comprise entre 0 et 50 ans",
                ),
                FeatureSpec::numeric(
                    WEEKLY_STUDY_HOURS,
                    1.0,
                    80.0,
                    "Les heures d'étude par semaine doivent être comprises entre 1 et 80",
                ),
                FeatureSpec::numeric(
                    PRIOR_AVERAGE_GRADE,
                    0.0,
                    20.0,
                    "La note moyenne doit être comprise entre 0 et 20",
                ),
                FeatureSpec::categorical(
                    DIFFICULTY,
                    &DIFFICULTY_LEVELS,
                    "La difficulté de formation doit être l'une des suivantes",
                ),
                FeatureSpec::numeric(
                    PLANNED_WEEKS,
                    1.0,
                    156.0,
                    "La durée de formation prévue doit être comprise entre 1 et 156 semaines",
                ),
            ],
            target: TARGET_COLUMN.to_string(),
            encoders: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature names in matrix column order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn encoder(&self, name: &str) -> Option<&CategoricalEncoder> {
        self.encoders.iter().find(|e| e.feature == name)
    }

    /// Look a categorical value up in the frozen encoder for `name`
    pub fn encode(&self, name: &str, raw: &str) -> Result<u32, UnknownCategoryError> {
        match self.encoder(name) {
            Some(encoder) => encoder.encode(raw),
            None => Err(UnknownCategoryError {
                feature: name.to_string(),
                value: raw.to_string(),
                rule: format!("Le champ {} n'est pas catégoriel", name),
                allowed: Vec::new(),
            }),
        }
    }

    /// Encode one row given in contract order. Training and inference both
    /// go through here so the two sides cannot drift apart.
    pub fn encode_row(&self, values: &[FieldValue]) -> Result<Vec<f64>, ValidationError> {
        if let Some(spec) = self.features.get(values.len()) {
            return Err(ValidationError::MissingField {
                field: spec.name.clone(),
            });
        }
        self.features
            .iter()
            .zip(values)
            .map(|(spec, value)| match (&spec.kind, value) {
                (FeatureKind::Numeric { .. }, FieldValue::Number(x)) => Ok(*x),
                (FeatureKind::Numeric { .. }, FieldValue::Text(_)) => Err(ValidationError::NotNumeric {
                    field: spec.name.clone(),
                }),
                (FeatureKind::Categorical { .. }, FieldValue::Text(raw)) => {
                    Ok(self.encode(&spec.name, raw)? as f64)
                }
                (FeatureKind::Categorical { .. }, FieldValue::Number(_)) => Err(ValidationError::NotText {
                    field: spec.name.clone(),
                }),
            })
            .collect()
    }

    /// Fit one encoder per categorical feature from the canonical
    /// vocabulary and every value observed in the training data.
    /// Observed values outside the vocabulary are rejected.
    pub fn fit_encoders<'a, F>(&mut self, observed: F) -> Result<(), UnknownCategoryError>
    where
        F: Fn(&str) -> Vec<&'a str>,
    {
        let mut encoders = Vec::new();
        for spec in &self.features {
            let FeatureKind::Categorical { vocabulary, rule } = &spec.kind else {
                continue;
            };
            let values = observed(&spec.name);
            if let Some(unknown) = values.iter().find(|v| !vocabulary.iter().any(|a| a == *v)) {
                return Err(UnknownCategoryError {
                    feature: spec.name.clone(),
                    value: unknown.to_string(),
                    rule: rule.clone(),
                    allowed: vocabulary.clone(),
                });
            }
            let all = vocabulary.iter().map(String::as_str).chain(values);
            encoders.push(CategoricalEncoder::fit(&spec.name, rule, all));
        }
        self.encoders = encoders;
        Ok(())
    }

    /// Structural checks run whenever a contract is loaded
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.features.is_empty() {
            return Err("feature contract is empty".to_string());
        }
        let mut seen = HashSet::new();
        for spec in &self.features {
            if !seen.insert(spec.name.as_str()) {
                return Err(format!("feature {} listed twice", spec.name));
            }
            match &spec.kind {
                FeatureKind::Numeric { min, max, .. } if min > max => {
                    return Err(format!("feature {} has inverted bounds", spec.name));
                }
                FeatureKind::Categorical { vocabulary, .. } => {
                    let encoder = self
                        .encoder(&spec.name)
                        .ok_or_else(|| format!("no encoder for categorical feature {}", spec.name))?;
                    if !encoder.is_well_formed() {
                        return Err(format!("encoder for {} is not sorted", spec.name));
                    }
                    if let Some(missing) = vocabulary.iter().find(|v| encoder.encode(v).is_err()) {
                        return Err(format!(
                            "encoder for {} does not cover vocabulary value {}",
                            spec.name, missing
                        ));
                    }
                }
                FeatureKind::Numeric { .. } => {}
            }
        }
        if seen.contains(self.target.as_str()) {
            return Err(format!("target {} is also a feature", self.target));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted() -> FeatureContract {
        let mut contract = FeatureContract::canonical();
        contract.fit_encoders(|_| Vec::new()).unwrap();
        contract
    }

    #[test]
    fn test_canonical_order() {
        let contract = FeatureContract::canonical();
        let names: Vec<&str> = contract.names().collect();
        assert_eq!(
            names,
            vec![
                AGE,
                EDUCATION_LEVEL,
                TRAINING_EXPERIENCE,
                WEEKLY_STUDY_HOURS,
                PRIOR_AVERAGE_GRADE,
                DIFFICULTY,
                PLANNED_WEEKS
            ]
        );
        assert_eq!(contract.position(PLANNED_WEEKS), Some(6));
        assert_eq!(contract.target, TARGET_COLUMN);
    }

    #[test]
    fn test_unfitted_contract_is_inconsistent() {
        let contract = FeatureContract::canonical();
        assert!(contract.check_consistency().is_err());
    }

    #[test]
    fn test_fitted_contract_encodes() {
        let contract = fitted();
        assert!(contract.check_consistency().is_ok());
        assert_eq!(contract.encode(EDUCATION_LEVEL, "Bac").unwrap(), 0);
        assert_eq!(contract.encode(EDUCATION_LEVEL, "Doctorat").unwrap(), 4);
        assert_eq!(contract.encode(DIFFICULTY, "Difficile").unwrap(), 0);
        assert!(contract.encode(DIFFICULTY, "Impossible").is_err());
        assert!(contract.encode(AGE, "30").is_err());
    }

    #[test]
    fn test_encode_row_in_contract_order() {
        let contract = fitted();
        let row = vec![
            FieldValue::Number(30.0),
            FieldValue::Text("Bac+3".to_string()),
            FieldValue::Number(2.0),
            FieldValue::Number(20.0),
            FieldValue::Number(14.5),
            FieldValue::Text("Moyen".to_string()),
            FieldValue::Number(52.0),
        ];
        let encoded = contract.encode_row(&row).unwrap();
        assert_eq!(encoded, vec![30.0, 2.0, 2.0, 20.0, 14.5, 2.0, 52.0]);
    }

    #[test]
    fn test_encode_row_type_mismatch() {
        let contract = fitted();
        let mut row = vec![FieldValue::Number(1.0); 7];
        assert_eq!(
            contract.encode_row(&row).unwrap_err(),
            ValidationError::NotText {
                field: EDUCATION_LEVEL.to_string()
            }
        );
        row.truncate(3);
        assert!(matches!(
            contract.encode_row(&row).unwrap_err(),
            ValidationError::MissingField { .. }
        ));
    }

    #[test]
    fn test_fit_rejects_values_outside_vocabulary() {
        let mut contract = FeatureContract::canonical();
        let err = contract
            .fit_encoders(|name| {
                if name == EDUCATION_LEVEL {
                    vec!["Bac", "Master"]
                } else {
                    Vec::new()
                }
            })
            .unwrap_err();
        assert_eq!(err.feature, EDUCATION_LEVEL);
        assert_eq!(err.value, "Master");
    }

    #[test]
    fn test_duplicate_feature_detected() {
        let mut contract = fitted();
        contract.features.push(contract.features[0].clone());
        assert!(contract.check_consistency().unwrap_err().contains("twice"));
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let contract = fitted();
        let json = serde_json::to_string(&contract).unwrap();
        let restored: FeatureContract = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, contract);
        assert!(json.contains("\"kind\":\"categorical\""));
    }
}
