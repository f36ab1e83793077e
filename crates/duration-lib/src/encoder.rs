//! Frozen label encoding for categorical features
//!
//! Codes are positions in the lexicographically sorted vocabulary. The
//! mapping is fit once by the training pipeline and persisted with the
//! feature contract; inference only performs lookups.

use crate::errors::UnknownCategoryError;
use serde::{Deserialize, Serialize};

/// Injective mapping from vocabulary value to integer code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    pub feature: String,
    /// Sentence prefix used when reporting an unknown value
    pub rule: String,
    classes: Vec<String>,
}

impl CategoricalEncoder {
    /// Fit on every value observed for the feature. Duplicates collapse.
    pub fn fit<I, S>(feature: impl Into<String>, rule: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self {
            feature: feature.into(),
            rule: rule.into(),
            classes,
        }
    }

    pub fn encode(&self, value: &str) -> Result<u32, UnknownCategoryError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map(|idx| idx as u32)
            .map_err(|_| UnknownCategoryError {
                feature: self.feature.clone(),
                value: value.to_string(),
                rule: self.rule.clone(),
                allowed: self.classes.clone(),
            })
    }

    /// Classes must be strictly increasing for lookups to be valid
    pub fn is_well_formed(&self) -> bool {
        !self.classes.is_empty() && self.classes.windows(2).all(|w| w[0] < w[1])
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
