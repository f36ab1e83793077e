//! Duration server - serves training duration estimates over HTTP
//!
//! Loads one artifact bundle at start-up and refuses to run without it.

use anyhow::Result;
use duration_server::{api, build_state, config::EstimatorConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ESTIMATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting duration-server");

    let config = EstimatorConfig::load()?;
    info!(instance = %config.instance_name, artifacts = ?config.artifacts_dir, "Estimator configured");

    let state = match build_state(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = ?e, "Cannot serve without a complete artifact bundle");
            return Err(e);
        }
    };

    state
        .logger
        .log_startup(ESTIMATOR_VERSION, state.estimator.bundle_id(), config.port);

    let logger = state.logger.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        logger.log_shutdown("SIGINT received");
    };

    api::serve(config.port, state, shutdown).await?;
    info!("Shut down");

    Ok(())
}
