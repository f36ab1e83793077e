//! HTTP API for predictions, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use duration_lib::{
    health::HealthRegistry,
    observability::{EstimatorMetrics, StructuredLogger},
    DurationEstimator, ErrorResponse, PredictionRequest, SuccessResponse,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub estimator: Arc<dyn DurationEstimator>,
    pub health_registry: HealthRegistry,
    pub metrics: EstimatorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        estimator: Arc<dyn DurationEstimator>,
        health_registry: HealthRegistry,
        metrics: EstimatorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            estimator,
            health_registry,
            metrics,
            logger,
        }
    }
}

fn failure(error: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error))).into_response()
}

/// Estimate a training duration. Every failure answers 400 with the
/// failure envelope, including bodies that are not JSON objects.
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let reason = rejection.body_text();
            state.metrics.inc_prediction_errors();
            state.logger.log_prediction_failure(&reason);
            return failure(reason);
        }
    };

    match state.estimator.predict(&request) {
        Ok(result) => {
            let elapsed = start.elapsed().as_secs_f64();
            state.metrics.observe_prediction_latency(elapsed);
            state.metrics.inc_predictions();
            state.logger.log_prediction(
                &result.bundle_id,
                result.weeks,
                result.interval.lower,
                result.interval.upper,
                result.months,
                elapsed,
            );
            state.health_registry.observe_inference(state.estimator.stats()).await;
            (StatusCode::OK, Json(SuccessResponse::from(&result))).into_response()
        }
        Err(err) => {
            state.metrics.inc_validation_failures(err.field());
            state.logger.log_rejection(err.field(), &err.to_string());
            failure(err.to_string())
        }
    }
}

/// Liveness: always 200 while serving; component detail in the body
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.health_registry.health().await))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
