//! HTTP front end for the training duration estimator

pub mod api;
pub mod config;

use anyhow::{Context, Result};
use api::AppState;
use config::EstimatorConfig;
use duration_lib::{
    health::{components, HealthRegistry},
    observability::{EstimatorMetrics, StructuredLogger},
    ArtifactBundle, BundlePredictor,
};
use std::sync::Arc;

/// Load the artifact bundle and assemble the serving state. Fails when the
/// bundle is missing or inconsistent; the server must not start without it.
pub async fn build_state(config: &EstimatorConfig) -> Result<Arc<AppState>> {
    let health_registry = HealthRegistry::new();
    let metrics = EstimatorMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let dir = config.artifacts_dir.clone();
    let bundle = tokio::task::spawn_blocking(move || ArtifactBundle::load(&dir))
        .await
        .context("Bundle loading task failed")?
        .with_context(|| format!("Failed to load artifact bundle from {}", config.artifacts_dir.display()))?;

    health_registry.register(components::ARTIFACTS).await;
    health_registry.set_bundle(bundle.bundle_id()).await;
    metrics.set_bundle_info(bundle.bundle_id(), bundle.model.trees.len());
    logger.log_bundle_loaded(
        bundle.bundle_id(),
        &config.artifacts_dir.display().to_string(),
        bundle.model.trees.len(),
        bundle.contract.len(),
    );

    let estimator = Arc::new(BundlePredictor::new(Arc::new(bundle)));
    health_registry.register(components::PREDICTOR).await;
    health_registry.set_ready(true).await;

    Ok(Arc::new(AppState::new(estimator, health_registry, metrics, logger)))
}
