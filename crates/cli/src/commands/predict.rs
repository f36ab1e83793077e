//! Estimate requests, local or remote

use anyhow::{Context, Result};
use colored::Colorize;
use duration_lib::{
    contract::{
        AGE, DIFFICULTY, EDUCATION_LEVEL, PLANNED_WEEKS, PRIOR_AVERAGE_GRADE, TRAINING_EXPERIENCE,
        WEEKLY_STUDY_HOURS,
    },
    ArtifactBundle, BundlePredictor, DurationEstimator, ErrorResponse, PredictResponse,
    PredictionRequest, SuccessResponse,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tabled::{settings::Style, Table};
use tracing::debug;

use super::train::FieldRow;
use crate::client::ApiClient;
use crate::output::{format_months, format_weeks, print_heading, print_json, OutputFormat};
use crate::PredictArgs;

/// Assemble the request from `--input` and the feature flags
pub fn build_request(args: &PredictArgs) -> Result<PredictionRequest> {
    let mut request = match &args.input {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str::<Value>(&content).context("Failed to parse request file")? {
                Value::Object(fields) => PredictionRequest::from(fields),
                _ => anyhow::bail!("{} must hold a JSON object", path.display()),
            }
        }
        None => PredictionRequest::new(),
    };

    let numbers = [
        (AGE, args.age),
        (TRAINING_EXPERIENCE, args.experience),
        (WEEKLY_STUDY_HOURS, args.study_hours),
        (PRIOR_AVERAGE_GRADE, args.grade),
        (PLANNED_WEEKS, args.planned_weeks),
    ];
    for (name, value) in numbers {
        if let Some(value) = value {
            request = request.with(name, value);
        }
    }

    let labels = [
        (EDUCATION_LEVEL, &args.education),
        (DIFFICULTY, &args.difficulty),
    ];
    for (name, value) in labels {
        if let Some(value) = value {
            request = request.with(name, value.as_str());
        }
    }

    if request.fields.is_empty() {
        anyhow::bail!("No features given; pass --input or the feature flags (see --help)");
    }

    Ok(request)
}

/// Estimate from a bundle on disk, without a server
pub fn predict_local(dir: &Path, request: &PredictionRequest, format: OutputFormat) -> Result<()> {
    let bundle = ArtifactBundle::load(dir)
        .with_context(|| format!("Failed to load bundle from {}", dir.display()))?;
    let predictor = BundlePredictor::new(Arc::new(bundle));
    debug!(bundle_id = predictor.bundle_id(), "Predicting locally");

    let response = match predictor.predict(request) {
        Ok(result) => PredictResponse::Success(SuccessResponse::from(&result)),
        Err(e) => PredictResponse::Failure(ErrorResponse::new(e.to_string())),
    };

    render(&response, format)
}

/// Estimate through the server's `POST /predict`
pub async fn predict_remote(
    client: &ApiClient,
    request: &PredictionRequest,
    format: OutputFormat,
) -> Result<()> {
    let response = client.predict(request).await?;
    render(&response, format)
}

fn render(response: &PredictResponse, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        print_json(response)?;
    }

    match response {
        PredictResponse::Success(success) => {
            if format == OutputFormat::Table {
                print_success_table(success);
            }
            Ok(())
        }
        PredictResponse::Failure(failure) => {
            anyhow::bail!("{}: {}", failure.message, failure.error)
        }
    }
}

fn print_success_table(success: &SuccessResponse) {
    let prediction = &success.prediction;
    let interval = &prediction.intervalle_confiance;

    print_heading("Estimated Training Duration");
    let rows = vec![
        FieldRow::new("Weeks", format_weeks(prediction.duree_semaines).green().bold()),
        FieldRow::new("Months", format_months(prediction.duree_mois)),
        FieldRow::new(
            &format!("Interval ({}%)", interval.niveau_confiance),
            format!(
                "{} – {}",
                format_weeks(interval.minimum),
                format_weeks(interval.maximum)
            ),
        ),
    ];
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    println!("{}", success.message);
    println!("{}", success.details.precision.dimmed());
    println!("{}", success.details.recommandation.dimmed());
}
