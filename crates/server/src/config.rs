//! Estimator configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "ESTIMATOR";

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    /// Name attached to every structured log record
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// HTTP port for prediction, health and metrics
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the artifact bundle
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_port() -> u16 {
    5545
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            port: default_port(),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

impl EstimatorConfig {
    /// Load configuration from `ESTIMATOR_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_env(env: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read estimator configuration")?
            .try_deserialize()
            .context("Invalid estimator configuration")
    }
}
