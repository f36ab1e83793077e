//! Historical dataset loading
//!
//! Reads a headed CSV of past programs. Every contract column and the
//! target must be present; any missing column or malformed cell aborts
//! the load.

use crate::contract::{
    FeatureContract, FeatureKind, FieldValue, AGE, DIFFICULTY, DIFFICULTY_LEVELS, EDUCATION_LEVEL,
    EDUCATION_LEVELS, PLANNED_WEEKS, PRIOR_AVERAGE_GRADE, TRAINING_EXPERIENCE, WEEKLY_STUDY_HOURS,
};
use crate::errors::{TrainingError, ValidationError};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io;
use std::path::Path;

/// Raw rows in contract column order, with their realized durations
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub rows: Vec<Vec<FieldValue>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn from_csv<P: AsRef<Path>>(path: P, contract: &FeatureContract) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|source| TrainingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(reader, contract).map_err(|err| match err {
            TrainingError::Read { source, .. } => TrainingError::Read {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_reader<R: io::Read>(reader: R, contract: &FeatureContract) -> Result<Self, TrainingError> {
        Self::from_csv_reader(csv::Reader::from_reader(reader), contract)
    }

    fn from_csv_reader<R: io::Read>(
        mut reader: csv::Reader<R>,
        contract: &FeatureContract,
    ) -> Result<Self, TrainingError> {
        let read_err = |source| TrainingError::Read {
            path: Default::default(),
            source,
        };
        let headers = reader.headers().map_err(read_err)?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TrainingError::MissingColumn(name.to_string()))
        };

        let feature_columns = contract
            .features
            .iter()
            .map(|spec| column(&spec.name))
            .collect::<Result<Vec<_>, _>>()?;
        let target_column = column(&contract.target)?;

        let mut rows = Vec::new();
        let mut targets = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            let row_number = idx + 1;
            let record = record.map_err(read_err)?;
            let cell = |col: usize, name: &str| {
                record
                    .get(col)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| TrainingError::Malformed {
                        row: row_number,
                        column: name.to_string(),
                        reason: "empty value".to_string(),
                    })
            };

            let mut values = Vec::with_capacity(feature_columns.len());
            for (spec, &col) in contract.features.iter().zip(&feature_columns) {
                let raw = cell(col, &spec.name)?;
                values.push(match spec.kind {
                    FeatureKind::Numeric { .. } => FieldValue::Number(parse_number(raw, row_number, &spec.name)?),
                    FeatureKind::Categorical { .. } => FieldValue::Text(raw.to_string()),
                });
            }
            let target = parse_number(cell(target_column, &contract.target)?, row_number, &contract.target)?;

            rows.push(values);
            targets.push(target);
        }

        if rows.is_empty() {
            return Err(TrainingError::InsufficientData("dataset has no rows".to_string()));
        }

        Ok(Self {
            feature_names: contract.names().map(str::to_string).collect(),
            target_name: contract.target.clone(),
            rows,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every value observed in a text column
    pub fn categorical_values(&self, feature: &str) -> Vec<&str> {
        let Some(col) = self.feature_names.iter().position(|n| n == feature) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| match row.get(col) {
                Some(FieldValue::Text(v)) => Some(v.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Encode every row through the contract's frozen encoders into a
    /// `rows × features` matrix
    pub fn encode(&self, contract: &FeatureContract) -> Result<Array2<f64>, TrainingError> {
        let mut matrix = Array2::<f64>::zeros((self.rows.len(), contract.len()));
        for (idx, (row, mut out)) in self.rows.iter().zip(matrix.outer_iter_mut()).enumerate() {
            let encoded = contract.encode_row(row).map_err(|err| match err {
                ValidationError::UnknownCategory(source) => TrainingError::UnknownCategory { row: idx + 1, source },
                other => TrainingError::Malformed {
                    row: idx + 1,
                    column: other.field().to_string(),
                    reason: other.to_string(),
                },
            })?;
            out.assign(&ArrayView1::from(&encoded));
        }
        Ok(matrix)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        let mut header: Vec<&str> = self.feature_names.iter().map(String::as_str).collect();
        header.push(&self.target_name);
        writer.write_record(&header)?;

        for (row, target) in self.rows.iter().zip(&self.targets) {
            let mut record: Vec<String> = row
                .iter()
                .map(|v| match v {
                    FieldValue::Number(x) => x.to_string(),
                    FieldValue::Text(s) => s.clone(),
                })
                .collect();
            record.push(target.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse_number(raw: &str, row: usize, column: &str) -> Result<f64, TrainingError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TrainingError::Malformed {
            row,
            column: column.to_string(),
            reason: format!("'{}' is not a number", raw),
        })
}

/// Deterministic synthetic history for demos and tests.
///
/// Realized duration grows with the planned duration and difficulty and
/// shrinks with study hours and prior grades, with multiplicative noise.
pub fn sample_dataset(rows: usize, seed: u64) -> Dataset {
    let contract = FeatureContract::canonical();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(rows);
    let mut targets = Vec::with_capacity(rows);

    for _ in 0..rows {
        let age = rng.gen_range(18..=60) as f64;
        let education = *EDUCATION_LEVELS.choose(&mut rng).unwrap_or(&"Bac");
        let experience = rng.gen_range(0..=20) as f64;
        let hours = rng.gen_range(2..=40) as f64;
        let grade = (rng.gen_range(80..=190) as f64) / 10.0;
        let difficulty = *DIFFICULTY_LEVELS.choose(&mut rng).unwrap_or(&"Moyen");
        let planned = rng.gen_range(4..=104) as f64;

        let difficulty_factor = match difficulty {
            "Facile" => 0.9,
            "Difficile" => 1.2,
            _ => 1.0,
        };
        let pace = 1.0 + (20.0 - hours) / 80.0 - (grade - 12.0) / 60.0 - experience / 200.0;
        let noise = rng.gen_range(0.92..1.08);
        let realized = (planned * difficulty_factor * pace * noise).clamp(1.0, 156.0);

        let mut row = Vec::with_capacity(contract.len());
        for name in contract.names() {
            row.push(match name {
                AGE => FieldValue::Number(age),
                EDUCATION_LEVEL => FieldValue::Text(education.to_string()),
                TRAINING_EXPERIENCE => FieldValue::Number(experience),
                WEEKLY_STUDY_HOURS => FieldValue::Number(hours),
                PRIOR_AVERAGE_GRADE => FieldValue::Number(grade),
                DIFFICULTY => FieldValue::Text(difficulty.to_string()),
                PLANNED_WEEKS => FieldValue::Number(planned),
                _ => FieldValue::Number(0.0),
            });
        }
        data.push(row);
        targets.push((realized * 10.0).round() / 10.0);
    }

    Dataset {
        feature_names: contract.names().map(str::to_string).collect(),
        target_name: contract.target.clone(),
        rows: data,
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Âge,Niveau_Éducation,Expérience_Formation,Heures_Étude_Par_Semaine,Note_Moyenne_Antérieure,Difficulté_Formation,Durée_Formation_Prévue,Durée_Formation_Réelle";

    #[test]
    fn test_load_csv() {
        let csv = format!("{}\n30,Bac+3,2,20,14.5,Moyen,52,55.5\n45,Doctorat,10,8,16,Difficile,26,30\n", HEADER);
        let contract = FeatureContract::canonical();
        let dataset = Dataset::from_reader(csv.as_bytes(), &contract).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows[0][0], FieldValue::Number(30.0));
        assert_eq!(dataset.rows[0][1], FieldValue::Text("Bac+3".to_string()));
        assert_eq!(dataset.targets, vec![55.5, 30.0]);
        assert_eq!(dataset.categorical_values(DIFFICULTY), vec!["Moyen", "Difficile"]);
    }

    #[test]
    fn test_columns_may_appear_in_any_order() {
        let csv = "Durée_Formation_Réelle,Durée_Formation_Prévue,Difficulté_Formation,Note_Moyenne_Antérieure,Heures_Étude_Par_Semaine,Expérience_Formation,Niveau_Éducation,Âge,Extra\n\
                   40,36,Facile,12,10,1,Bac,22,x\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), &FeatureContract::canonical()).unwrap();
        assert_eq!(dataset.rows[0][0], FieldValue::Number(22.0));
        assert_eq!(dataset.rows[0][6], FieldValue::Number(36.0));
        assert_eq!(dataset.targets[0], 40.0);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let csv = "Âge,Niveau_Éducation,Expérience_Formation,Heures_Étude_Par_Semaine,Note_Moyenne_Antérieure,Difficulté_Formation,Durée_Formation_Prévue\n\
                   30,Bac+3,2,20,14.5,Moyen,52\n";
        let err = Dataset::from_reader(csv.as_bytes(), &FeatureContract::canonical()).unwrap_err();
        assert!(matches!(err, TrainingError::MissingColumn(ref c) if c == "Durée_Formation_Réelle"));
    }

    #[test]
    fn test_malformed_number_is_fatal() {
        let csv = format!("{}\n30,Bac+3,2,vingt,14.5,Moyen,52,55\n", HEADER);
        let err = Dataset::from_reader(csv.as_bytes(), &FeatureContract::canonical()).unwrap_err();
        match err {
            TrainingError::Malformed { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, WEEKLY_STUDY_HOURS);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_dataset_is_fatal() {
        let err = Dataset::from_reader(format!("{}\n", HEADER).as_bytes(), &FeatureContract::canonical()).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientData(_)));
    }

    #[test]
    fn test_sample_dataset_is_deterministic_and_valid() {
        let a = sample_dataset(50, 42);
        let b = sample_dataset(50, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(a.targets.iter().all(|t| (1.0..=156.0).contains(t)));

        let mut contract = FeatureContract::canonical();
        contract.fit_encoders(|name| a.categorical_values(name)).unwrap();
        assert_eq!(a.encode(&contract).unwrap().dim(), (50, contract.len()));
    }

    #[test]
    fn test_write_then_read() {
        let original = sample_dataset(10, 3);
        let mut buf = Vec::new();
        original.write_csv(&mut buf).unwrap();
        let restored = Dataset::from_reader(buf.as_slice(), &FeatureContract::canonical()).unwrap();
        assert_eq!(restored, original);
    }
}
