//! Server health check

use anyhow::Result;
use duration_lib::{ComponentStatus, HealthResponse, ReadinessResponse};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::ApiClient;
use crate::output::{color_status, print_heading, print_info, print_json, print_warning, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthOutput<'a> {
    health: &'a HealthResponse,
    ready: bool,
}

fn status_label(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
    }
}

/// Query `/health` and `/readyz` and print the result
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get("health").await?;
    // /readyz answers 503 until the bundle is loaded
    let ready = client
        .get::<ReadinessResponse>("readyz")
        .await
        .map(|r| r.ready)
        .unwrap_or(false);

    match format {
        OutputFormat::Json => print_json(&HealthOutput {
            health: &health,
            ready,
        })?,
        OutputFormat::Table => {
            print_heading("Estimator Health");
            println!("Status: {}", color_status(status_label(health.status)));
            println!(
                "Ready:  {}",
                color_status(if ready { "ready" } else { "not ready" })
            );
            if let Some(bundle_id) = &health.bundle_id {
                println!("Bundle: {}", bundle_id);
            }
            println!();

            if health.components.is_empty() {
                print_info("No components reported");
            } else {
                let mut rows: Vec<ComponentRow> = health
                    .components
                    .iter()
                    .map(|(name, component)| ComponentRow {
                        name: name.clone(),
                        status: color_status(status_label(component.status)),
                        message: component.message.clone().unwrap_or_default(),
                    })
                    .collect();
                rows.sort_by(|a, b| a.name.cmp(&b.name));

                let table = Table::new(rows).with(Style::rounded()).to_string();
                println!("{}", table);
            }

            let degraded = health.degraded_components();
            if !degraded.is_empty() {
                println!();
                print_warning(&format!("Degraded components: {}", degraded.join(", ")));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unreachable_health_fails_the_command() {
        let mut server = mockito::Server::new();
        let _health = server.mock("GET", "/health").with_status(503).create();
        let _ready = server.mock("GET", "/readyz").with_status(503).create();

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(tokio_test::block_on(show_health(&client, OutputFormat::Table)).is_err());
    }

    #[test]
    fn test_degraded_component_is_reported_not_fatal() {
        let mut server = mockito::Server::new();
        let _health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(
                json!({
                    "status": "healthy",
                    "bundle_id": "abc",
                    "components": {
                        "artifacts": {"status": "healthy", "last_check_timestamp": 0},
                        "predictor": {"status": "degraded", "message": "slow", "last_check_timestamp": 0}
                    }
                })
                .to_string(),
            )
            .create();
        let _ready = server
            .mock("GET", "/readyz")
            .with_status(200)
            .with_body(json!({"ready": true}).to_string())
            .create();

        let client = ApiClient::new(&server.url()).unwrap();
        tokio_test::block_on(show_health(&client, OutputFormat::Table)).unwrap();
    }

    #[test]
    fn test_healthy_server() {
        let mut server = mockito::Server::new();
        let _health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(json!({"status": "healthy", "bundle_id": "abc", "components": {}}).to_string())
            .create();
        let _ready = server
            .mock("GET", "/readyz")
            .with_status(200)
            .with_body(json!({"ready": true}).to_string())
            .create();

        let client = ApiClient::new(&server.url()).unwrap();
        tokio_test::block_on(show_health(&client, OutputFormat::Json)).unwrap();
    }
}
