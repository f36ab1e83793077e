//! Training Duration Estimator CLI
//!
//! A command-line tool for training artifact bundles, inspecting them,
//! and requesting estimates locally or from a running duration server.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{data, health, inspect, predict, train};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Training Duration Estimator CLI
#[derive(Parser)]
#[command(name = "tdp")]
#[command(author, version, about = "CLI for the Training Duration Estimator", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via TDP_API_URL env var)
    #[arg(long, env = "TDP_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on historical data and write an artifact bundle
    Train {
        /// CSV file of historical training records
        #[arg(long, short)]
        data: PathBuf,

        /// Bundle directory to create (can also be set via TDP_ARTIFACTS_DIR)
        #[arg(long, short, env = "TDP_ARTIFACTS_DIR")]
        output: Option<PathBuf>,

        /// Seed for the split, bootstrap samples and feature sampling
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Share of rows held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Search a single small configuration instead of the full grid
        #[arg(long)]
        quick: bool,

        /// Replace an existing bundle at the output path
        #[arg(long)]
        force: bool,
    },

    /// Write a reproducible synthetic historical dataset as CSV
    SampleData {
        /// Output file (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Number of records
        #[arg(long, default_value_t = 500)]
        rows: usize,

        /// Generator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Show the manifest and training report of a bundle
    Inspect {
        /// Bundle directory (can also be set via TDP_ARTIFACTS_DIR)
        #[arg(long, short, env = "TDP_ARTIFACTS_DIR")]
        artifacts: Option<PathBuf>,
    },

    /// Estimate a training duration
    Predict(PredictArgs),

    /// Check the health of a running server
    Health,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Predict locally from this bundle instead of calling the API
    #[arg(long, short)]
    pub artifacts: Option<PathBuf>,

    /// JSON file holding the request object; flags below override its fields
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Age of the learner (Âge)
    #[arg(long)]
    pub age: Option<f64>,

    /// Education level (Niveau_Éducation)
    #[arg(long)]
    pub education: Option<String>,

    /// Prior training experience (Expérience_Formation)
    #[arg(long)]
    pub experience: Option<f64>,

    /// Weekly study hours (Heures_Étude_Par_Semaine)
    #[arg(long)]
    pub study_hours: Option<f64>,

    /// Prior average grade out of 20 (Note_Moyenne_Antérieure)
    #[arg(long)]
    pub grade: Option<f64>,

    /// Training difficulty (Difficulté_Formation)
    #[arg(long)]
    pub difficulty: Option<String>,

    /// Planned duration in weeks (Durée_Formation_Prévue)
    #[arg(long)]
    pub planned_weeks: Option<f64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    match cli.command {
        Commands::Train {
            data,
            output,
            seed,
            test_fraction,
            quick,
            force,
        } => {
            let options = train::TrainOptions {
                data,
                output: config.artifacts_dir(output),
                seed,
                test_fraction,
                quick,
                force,
            };
            tokio::task::spawn_blocking(move || train::run_training(options, cli.format)).await??;
        }
        Commands::SampleData { output, rows, seed } => {
            data::write_sample_data(output.as_deref(), rows, seed)?;
        }
        Commands::Inspect { artifacts } => {
            inspect::show_bundle(&config.artifacts_dir(artifacts), cli.format)?;
        }
        Commands::Predict(args) => {
            let request = predict::build_request(&args)?;
            match args.artifacts {
                Some(dir) => predict::predict_local(&dir, &request, cli.format)?,
                None => {
                    let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
                    predict::predict_remote(&client, &request, cli.format).await?;
                }
            }
        }
        Commands::Health => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
