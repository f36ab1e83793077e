//! Error taxonomy for training, artifact loading and inference

use std::path::PathBuf;
use thiserror::Error;

/// A categorical value outside the vocabulary frozen at training time.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{rule}: {}", .allowed.join(", "))]
pub struct UnknownCategoryError {
    pub feature: String,
    pub value: String,
    pub rule: String,
    pub allowed: Vec<String>,
}

/// Request rejected before the model is invoked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Le champ {field} est requis")]
    MissingField { field: String },

    #[error("Le champ {field} doit être numérique")]
    NotNumeric { field: String },

    #[error("Le champ {field} doit être une chaîne de caractères")]
    NotText { field: String },

    #[error("{message}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
        message: String,
    },

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryError),
}

impl ValidationError {
    /// Name of the offending feature
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField { field }
            | ValidationError::NotNumeric { field }
            | ValidationError::NotText { field }
            | ValidationError::OutOfRange { field, .. } => field,
            ValidationError::UnknownCategory(err) => &err.feature,
        }
    }
}

/// The artifact bundle could not be loaded; the service must not start.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("artifact {path:?} is missing")]
    Missing { path: PathBuf },

    #[error("failed to read artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checksum mismatch for {file}: manifest has {expected}, file has {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("inconsistent bundle: {0}")]
    Inconsistent(String),
}

/// Fatal error for a training run. No artifact is written when one occurs.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("failed to read dataset {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("dataset is missing required column {0}")]
    MissingColumn(String),

    #[error("row {row}, column {column}: {reason}")]
    Malformed {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("row {row}: {source}")]
    UnknownCategory {
        row: usize,
        #[source]
        source: UnknownCategoryError,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("trained artifacts are inconsistent: {0}")]
    Inconsistent(#[from] ArtifactLoadError),

    #[error("failed to write artifact bundle to {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },
}
