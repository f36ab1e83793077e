//! Artifact bundle persistence
//!
//! A bundle is a directory holding the trained forest, the fitted scaler
//! and the feature contract, plus a manifest with the SHA256 of each.
//! The three artifacts are always written and loaded together; the
//! manifest checksums bind them to a single training run.

use crate::contract::FeatureContract;
use crate::errors::{ArtifactLoadError, TrainingError};
use crate::forest::RandomForest;
use crate::scaler::StandardScaler;
use crate::training::TrainingReport;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURES_FILE: &str = "features.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Describes one training run's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle_id: String,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    /// Base seed the forest was grown from
    pub seed: u64,
    pub feature_names: Vec<String>,
    pub tree_count: usize,
    /// File name to hex SHA256
    pub checksums: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

/// Model, scaler and contract from one training run. Immutable once built.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub contract: FeatureContract,
    pub scaler: StandardScaler,
    pub model: RandomForest,
    pub manifest: BundleManifest,
}

impl ArtifactBundle {
    pub fn new(
        contract: FeatureContract,
        scaler: StandardScaler,
        model: RandomForest,
        report: Option<TrainingReport>,
    ) -> Result<Self, ArtifactLoadError> {
        check_consistency(&contract, &scaler, &model)?;

        let mut checksums = BTreeMap::new();
        for (name, bytes) in serialize_parts(&contract, &scaler, &model)? {
            checksums.insert(name.to_string(), compute_checksum(&bytes));
        }
        let bundle_id = bundle_id(&checksums);

        let manifest = BundleManifest {
            bundle_id,
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            seed: model.seed,
            feature_names: contract.names().map(str::to_string).collect(),
            tree_count: model.trees.len(),
            checksums,
            report,
        };

        Ok(Self {
            contract,
            scaler,
            model,
            manifest,
        })
    }

    pub fn bundle_id(&self) -> &str {
        &self.manifest.bundle_id
    }

    /// Write the bundle to `dir`, which must not exist yet. Files go to a
    /// staging directory first and are moved into place in one rename.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, TrainingError> {
        let write_err = |reason: String| TrainingError::Write {
            path: dir.to_path_buf(),
            reason,
        };
        if dir.exists() {
            return Err(write_err("destination already exists".to_string()));
        }

        let name = dir
            .file_name()
            .ok_or_else(|| write_err("destination has no directory name".to_string()))?
            .to_string_lossy();
        let staging = dir.with_file_name(format!(".{}.staging-{}", name, std::process::id()));

        let result = self.write_files(&staging).and_then(|_| {
            fs::rename(&staging, dir).map_err(|e| format!("failed to move staged bundle: {}", e))
        });

        if let Err(reason) = result {
            if staging.exists() {
                if let Err(e) = fs::remove_dir_all(&staging) {
                    warn!(path = ?staging, error = %e, "Failed to clean up staging directory");
                }
            }
            return Err(write_err(reason));
        }

        info!(
            bundle_id = %self.manifest.bundle_id,
            path = ?dir,
            trees = self.manifest.tree_count,
            "Artifact bundle written"
        );
        Ok(dir.to_path_buf())
    }

    fn write_files(&self, staging: &Path) -> Result<(), String> {
        fs::create_dir_all(staging).map_err(|e| format!("failed to create staging directory: {}", e))?;

        let parts = serialize_parts(&self.contract, &self.scaler, &self.model).map_err(|e| e.to_string())?;
        for (name, bytes) in parts {
            fs::write(staging.join(name), bytes).map_err(|e| format!("failed to write {}: {}", name, e))?;
        }

        let manifest = serde_json::to_vec_pretty(&self.manifest).map_err(|e| e.to_string())?;
        fs::write(staging.join(MANIFEST_FILE), manifest)
            .map_err(|e| format!("failed to write {}: {}", MANIFEST_FILE, e))?;
        Ok(())
    }

    /// Load and verify a bundle. Any missing, corrupted or mismatched
    /// artifact fails the whole load.
    pub fn load(dir: &Path) -> Result<Self, ArtifactLoadError> {
        let manifest: BundleManifest = parse(&dir.join(MANIFEST_FILE), &read(&dir.join(MANIFEST_FILE))?)?;

        let contract: FeatureContract = read_verified(dir, FEATURES_FILE, &manifest)?;
        let scaler: StandardScaler = read_verified(dir, SCALER_FILE, &manifest)?;
        let model: RandomForest = read_verified(dir, MODEL_FILE, &manifest)?;

        check_consistency(&contract, &scaler, &model)?;

        let names: Vec<&str> = contract.names().collect();
        if manifest.feature_names != names {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "manifest lists features {:?}, contract has {:?}",
                manifest.feature_names, names
            )));
        }
        if manifest.tree_count != model.trees.len() {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "manifest lists {} trees, model has {}",
                manifest.tree_count,
                model.trees.len()
            )));
        }
        if manifest.bundle_id != bundle_id(&manifest.checksums) {
            return Err(ArtifactLoadError::Inconsistent(
                "bundle id does not match artifact checksums".to_string(),
            ));
        }

        debug!(bundle_id = %manifest.bundle_id, path = ?dir, "Artifact bundle verified");

        Ok(Self {
            contract,
            scaler,
            model,
            manifest,
        })
    }
}

fn serialize_parts(
    contract: &FeatureContract,
    scaler: &StandardScaler,
    model: &RandomForest,
) -> Result<[(&'static str, Vec<u8>); 3], ArtifactLoadError> {
    let to_bytes = |name: &str, result: serde_json::Result<Vec<u8>>| {
        result.map_err(|source| ArtifactLoadError::Parse {
            path: PathBuf::from(name),
            source,
        })
    };
    Ok([
        (FEATURES_FILE, to_bytes(FEATURES_FILE, serde_json::to_vec_pretty(contract))?),
        (SCALER_FILE, to_bytes(SCALER_FILE, serde_json::to_vec_pretty(scaler))?),
        (MODEL_FILE, to_bytes(MODEL_FILE, serde_json::to_vec(model))?),
    ])
}

fn check_consistency(
    contract: &FeatureContract,
    scaler: &StandardScaler,
    model: &RandomForest,
) -> Result<(), ArtifactLoadError> {
    contract.check_consistency().map_err(ArtifactLoadError::Inconsistent)?;

    if scaler.width() != contract.len() || scaler.scales.len() != contract.len() {
        return Err(ArtifactLoadError::Inconsistent(format!(
            "scaler has {} columns, contract has {} features",
            scaler.width(),
            contract.len()
        )));
    }
    if model.feature_count != contract.len() {
        return Err(ArtifactLoadError::Inconsistent(format!(
            "model expects {} features, contract has {}",
            model.feature_count,
            contract.len()
        )));
    }
    if model.trees.is_empty() {
        return Err(ArtifactLoadError::Inconsistent("model has no trees".to_string()));
    }
    for (idx, tree) in model.trees.iter().enumerate() {
        tree.check_layout()
            .map_err(|reason| ArtifactLoadError::Inconsistent(format!("tree {}: {}", idx, reason)))?;
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactLoadError> {
    fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactLoadError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            ArtifactLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn parse<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, ArtifactLoadError> {
    serde_json::from_slice(bytes).map_err(|source| ArtifactLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_verified<T: DeserializeOwned>(
    dir: &Path,
    file: &str,
    manifest: &BundleManifest,
) -> Result<T, ArtifactLoadError> {
    let path = dir.join(file);
    let bytes = read(&path)?;

    let expected = manifest.checksums.get(file).ok_or_else(|| {
        ArtifactLoadError::Inconsistent(format!("manifest has no checksum for {}", file))
    })?;
    let actual = compute_checksum(&bytes);
    if &actual != expected {
        return Err(ArtifactLoadError::ChecksumMismatch {
            file: file.to_string(),
            expected: expected.clone(),
            actual,
        });
    }

    parse(&path, &bytes)
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn bundle_id(checksums: &BTreeMap<String, String>) -> String {
    let joined: String = checksums.values().map(String::as_str).collect();
    compute_checksum(joined.as_bytes())[..16].to_string()
}
