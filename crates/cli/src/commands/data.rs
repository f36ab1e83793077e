//! Synthetic dataset generation

use anyhow::{Context, Result};
use duration_lib::training::sample_dataset;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use crate::output::print_success;

/// Write `rows` synthetic historical records to `output`, or stdout
pub fn write_sample_data(output: Option<&Path>, rows: usize, seed: u64) -> Result<()> {
    if rows == 0 {
        anyhow::bail!("--rows must be at least 1");
    }

    let dataset = sample_dataset(rows, seed);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            dataset
                .write_csv(BufWriter::new(file))
                .context("Failed to write dataset")?;
            print_success(&format!("Wrote {} records to {}", rows, path.display()));
        }
        None => {
            dataset
                .write_csv(io::stdout().lock())
                .context("Failed to write dataset")?;
        }
    }

    Ok(())
}
