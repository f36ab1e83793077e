//! Training CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use duration_lib::{
    artifacts::MANIFEST_FILE,
    contract::FeatureContract,
    forest::{ForestParams, MaxFeatures},
    training::{CandidateScore, Dataset, ParamGrid},
    StructuredLogger, TrainingConfig, TrainingPipeline, TrainingReport,
};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{info, warn};

use crate::output::{
    color_r2, format_metric, print_heading, print_info, print_json, print_success, OutputFormat,
};

/// Options of the `train` command
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub data: PathBuf,
    pub output: PathBuf,
    pub seed: u64,
    pub test_fraction: f64,
    pub quick: bool,
    pub force: bool,
}

/// Row of the summary table
#[derive(Tabled)]
pub(crate) struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl FieldRow {
    pub(crate) fn new(field: &str, value: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Row of the grid search leaderboard
#[derive(Tabled)]
pub(crate) struct CandidateRow {
    #[tabled(rename = "Trees")]
    trees: usize,
    #[tabled(rename = "Depth")]
    depth: usize,
    #[tabled(rename = "Min Split")]
    min_split: usize,
    #[tabled(rename = "Min Leaf")]
    min_leaf: usize,
    #[tabled(rename = "Features")]
    features: String,
    #[tabled(rename = "CV RMSE")]
    rmse: String,
    #[tabled(rename = "Std (MSE)")]
    std: String,
}

impl From<&CandidateScore> for CandidateRow {
    fn from(candidate: &CandidateScore) -> Self {
        let params = &candidate.params;
        Self {
            trees: params.n_estimators,
            depth: params.max_depth,
            min_split: params.min_samples_split,
            min_leaf: params.min_samples_leaf,
            features: max_features_label(params.max_features).to_string(),
            rmse: format_metric((-candidate.mean_score).sqrt()),
            std: format_metric(candidate.std_score),
        }
    }
}

pub(crate) fn max_features_label(max_features: MaxFeatures) -> &'static str {
    match max_features {
        MaxFeatures::Sqrt => "sqrt",
        MaxFeatures::All => "all",
    }
}

/// Grid with a single modest configuration for fast iterations
fn quick_grid() -> ParamGrid {
    let params = ForestParams {
        n_estimators: 50,
        ..ForestParams::default()
    };
    ParamGrid {
        n_estimators: vec![params.n_estimators],
        max_depth: vec![params.max_depth],
        min_samples_split: vec![params.min_samples_split],
        min_samples_leaf: vec![params.min_samples_leaf],
        max_features: vec![params.max_features],
    }
}

/// Check that `output` is free, or that it holds a bundle and `--force`
/// was given. A directory without a bundle manifest is never replaced.
fn check_destination(output: &Path, force: bool) -> Result<()> {
    if !output.exists() {
        return Ok(());
    }
    if !force {
        anyhow::bail!(
            "{} already exists; pass --force to replace it",
            output.display()
        );
    }
    if !output.join(MANIFEST_FILE).is_file() {
        anyhow::bail!(
            "{} exists but is not an artifact bundle; refusing to replace it",
            output.display()
        );
    }
    Ok(())
}

fn sibling(output: &Path, suffix: &str) -> Result<PathBuf> {
    let name = output
        .file_name()
        .with_context(|| format!("{} has no directory name", output.display()))?
        .to_string_lossy();
    Ok(output.with_file_name(format!(".{}.{}-{}", name, suffix, std::process::id())))
}

/// Write a bundle to `output` with `write`, replacing any bundle already
/// there. The new bundle is written next to the old one first; the old one
/// is only moved aside once the new one is complete, and is restored if the
/// final rename fails.
fn replace_bundle<F>(output: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if !output.exists() {
        return write(output);
    }

    let fresh = sibling(output, "new")?;
    let retired = sibling(output, "old")?;
    if fresh.exists() {
        std::fs::remove_dir_all(&fresh)
            .with_context(|| format!("Failed to clear stale {}", fresh.display()))?;
    }

    if let Err(e) = write(&fresh) {
        discard(&fresh);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(output, &retired) {
        discard(&fresh);
        return Err(e).with_context(|| format!("Failed to move previous bundle at {}", output.display()));
    }

    if let Err(e) = std::fs::rename(&fresh, output) {
        if let Err(restore) = std::fs::rename(&retired, output) {
            warn!(path = ?retired, error = %restore, "Failed to restore previous bundle");
        }
        discard(&fresh);
        return Err(e).with_context(|| format!("Failed to move new bundle to {}", output.display()));
    }

    discard(&retired);
    Ok(())
}

fn discard(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            warn!(path = ?dir, error = %e, "Failed to remove directory");
        }
    }
}

/// Run the training pipeline and write the bundle
pub fn run_training(options: TrainOptions, format: OutputFormat) -> Result<()> {
    check_destination(&options.output, options.force)?;

    let dataset = Dataset::from_csv(&options.data, &FeatureContract::canonical())
        .with_context(|| format!("Failed to load {}", options.data.display()))?;
    info!(rows = dataset.len(), path = ?options.data, "Dataset loaded");

    let mut config = TrainingConfig {
        seed: options.seed,
        test_fraction: options.test_fraction,
        ..TrainingConfig::default()
    };
    if options.quick {
        config.grid = quick_grid();
    }

    if format == OutputFormat::Table {
        print_info(&format!(
            "Training on {} records ({} grid points)...",
            dataset.len(),
            config.grid.candidates().len()
        ));
    }

    let pipeline = TrainingPipeline::new(config).with_logger(StructuredLogger::new("tdp"));
    let (bundle, report) = pipeline.run(&dataset).context("Training failed")?;

    check_destination(&options.output, options.force)?;
    replace_bundle(&options.output, |path| {
        bundle.save(path).map(|_| ()).context("Failed to write bundle")
    })?;

    match format {
        OutputFormat::Json => print_json(&bundle.manifest)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Bundle {} written to {}",
                bundle.bundle_id().cyan(),
                options.output.display()
            ));
            println!();
            print_report(&report);
        }
    }

    Ok(())
}

/// Print the training report as tables
pub(crate) fn print_report(report: &TrainingReport) {
    let evaluation = &report.evaluation;
    let params = &report.best_params;

    print_heading("Training Report");
    let rows = vec![
        FieldRow::new("Records", report.rows),
        FieldRow::new("Training rows", report.train_rows),
        FieldRow::new("Held-out rows", evaluation.held_out_rows),
        FieldRow::new("Seed", report.seed),
        FieldRow::new("Trees", params.n_estimators),
        FieldRow::new("Max depth", params.max_depth),
        FieldRow::new("Min samples split", params.min_samples_split),
        FieldRow::new("Min samples leaf", params.min_samples_leaf),
        FieldRow::new("Max features", max_features_label(params.max_features)),
        FieldRow::new(
            &format!("CV RMSE ({} folds)", evaluation.cv_folds),
            format!(
                "{} ± {}",
                format_metric(evaluation.rmse_cv_mean),
                format_metric(evaluation.rmse_cv_std)
            ),
        ),
        FieldRow::new("R²", color_r2(evaluation.r2_score)),
        FieldRow::new("RMSE", format_metric(evaluation.rmse)),
        FieldRow::new("MAE", format_metric(evaluation.mae)),
        FieldRow::new("Margin of error", format_metric(evaluation.confidence_interval)),
        FieldRow::new("Duration", format!("{:.1}s", report.duration_secs)),
    ];
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    if report.leaderboard.len() > 1 {
        println!();
        print_heading("Grid Search");
        let rows: Vec<CandidateRow> = report.leaderboard.iter().map(CandidateRow::from).collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }
}
