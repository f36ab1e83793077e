//! Health check infrastructure for the duration estimator
//!
//! Liveness always answers healthy once the process serves: the bundle is
//! a start-up precondition. Component entries carry the detail, and the
//! predictor is marked degraded while too many inferences run slow.

use crate::predictor::InferenceStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Inferences observed before the slow share is judged
pub const MIN_OBSERVED_INFERENCES: u64 = 50;

/// Share of slow inferences above which the predictor is degraded
pub const MAX_SLOW_SHARE: f64 = 0.1;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, with issues
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Names of the components currently reporting degraded, sorted
    pub fn degraded_components(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .components
            .iter()
            .filter(|(_, health)| health.status == ComponentStatus::Degraded)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const ARTIFACTS: &str = "artifacts";
    pub const PREDICTOR: &str = "predictor";
}

#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    bundle_id: Arc<RwLock<Option<String>>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            bundle_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    /// Mark the predictor degraded or healthy from its latency counters.
    /// The entry is only rewritten when its status changes.
    pub async fn observe_inference(&self, stats: InferenceStats) {
        let slow_share = if stats.total_inferences >= MIN_OBSERVED_INFERENCES {
            stats.slow_inferences as f64 / stats.total_inferences as f64
        } else {
            0.0
        };
        let wanted = if slow_share > MAX_SLOW_SHARE {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        };

        let current = self
            .components
            .read()
            .await
            .get(components::PREDICTOR)
            .map(|health| health.status);
        if current == Some(wanted) {
            return;
        }

        let health = match wanted {
            ComponentStatus::Healthy => ComponentHealth::healthy(),
            ComponentStatus::Degraded => ComponentHealth::degraded(format!(
                "{} of {} inferences exceeded the latency target",
                stats.slow_inferences, stats.total_inferences
            )),
        };
        self.update(components::PREDICTOR, health).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Record the bundle being served
    pub async fn set_bundle(&self, bundle_id: impl Into<String>) {
        *self.bundle_id.write().await = Some(bundle_id.into());
    }

    pub async fn health(&self) -> HealthResponse {
        HealthResponse {
            status: ComponentStatus::Healthy,
            bundle_id: self.bundle_id.read().await.clone(),
            components: self.components.read().await.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.ready.read().await {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Estimator not yet initialized".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total_inferences: u64, slow_inferences: u64) -> InferenceStats {
        InferenceStats {
            total_inferences,
            slow_inferences,
        }
    }

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert!(health.bundle_id.is_none());
    }

    #[tokio::test]
    async fn test_health_serializes_status_lowercase() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACTS).await;
        registry.set_bundle("0123abcd").await;

        let json = serde_json::to_value(registry.health().await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["bundle_id"], "0123abcd");
        assert_eq!(json["components"]["artifacts"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_slow_predictor_degrades_component_only() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACTS).await;
        registry.register(components::PREDICTOR).await;

        registry.observe_inference(stats(100, 20)).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.degraded_components(), vec![components::PREDICTOR]);
        let predictor = &health.components[components::PREDICTOR];
        assert_eq!(
            predictor.message.as_deref(),
            Some("20 of 100 inferences exceeded the latency target")
        );
    }

    #[tokio::test]
    async fn test_predictor_recovers_when_share_drops() {
        let registry = HealthRegistry::new();
        registry.register(components::PREDICTOR).await;

        registry.observe_inference(stats(60, 30)).await;
        assert_eq!(registry.health().await.degraded_components().len(), 1);

        registry.observe_inference(stats(400, 30)).await;
        let health = registry.health().await;
        assert!(health.degraded_components().is_empty());
        assert!(health.components[components::PREDICTOR].message.is_none());
    }

    #[tokio::test]
    async fn test_few_inferences_never_degrade() {
        let registry = HealthRegistry::new();
        registry.register(components::PREDICTOR).await;

        registry.observe_inference(stats(MIN_OBSERVED_INFERENCES - 1, MIN_OBSERVED_INFERENCES - 1)).await;
        assert!(registry.health().await.degraded_components().is_empty());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Estimator not yet initialized"));
    }

    #[tokio::test]
    async fn test_readiness_ready_when_set() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;

        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_degraded_predictor_stays_ready() {
        let registry = HealthRegistry::new();
        registry.register(components::PREDICTOR).await;
        registry.set_ready(true).await;
        registry.observe_inference(stats(100, 100)).await;

        assert!(registry.readiness().await.ready);
    }
}
