//! Bundle inspection

use anyhow::{Context, Result};
use colored::Colorize;
use duration_lib::{ArtifactBundle, BundleManifest, FeatureKind, FeatureSpec};
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use super::train::{print_report, FieldRow};
use crate::output::{print_heading, print_json, print_warning, short_digest, OutputFormat};

/// Row of the feature contract table
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Accepted")]
    accepted: String,
}

#[derive(Tabled)]
struct ChecksumRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "SHA-256")]
    digest: String,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    path: String,
    manifest: &'a BundleManifest,
    features: &'a [FeatureSpec],
    max_depth: usize,
    leaves: usize,
}

fn feature_rows(bundle: &ArtifactBundle) -> Vec<FeatureRow> {
    bundle
        .contract
        .features
        .iter()
        .enumerate()
        .map(|(position, feature)| {
            let (kind, accepted) = match &feature.kind {
                FeatureKind::Numeric { min, max, .. } => ("numeric", format!("{} – {}", min, max)),
                FeatureKind::Categorical { vocabulary, .. } => {
                    ("categorical", vocabulary.join(", "))
                }
            };
            FeatureRow {
                position,
                name: feature.name.clone(),
                kind: kind.to_string(),
                accepted,
            }
        })
        .collect()
}

/// Load and verify a bundle, then print its manifest
pub fn show_bundle(dir: &Path, format: OutputFormat) -> Result<()> {
    let bundle = ArtifactBundle::load(dir)
        .with_context(|| format!("Failed to load bundle from {}", dir.display()))?;
    let manifest = &bundle.manifest;
    let max_depth = bundle.model.trees.iter().map(|t| t.depth()).max().unwrap_or(0);
    let leaves: usize = bundle.model.trees.iter().map(|t| t.leaf_count()).sum();

    if format == OutputFormat::Json {
        return print_json(&InspectOutput {
            path: dir.display().to_string(),
            manifest,
            features: &bundle.contract.features,
            max_depth,
            leaves,
        });
    }

    print_heading("Artifact Bundle");
    let rows = vec![
        FieldRow::new("Bundle", manifest.bundle_id.cyan()),
        FieldRow::new("Path", dir.display()),
        FieldRow::new(
            "Created",
            manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ),
        FieldRow::new("Crate version", &manifest.crate_version),
        FieldRow::new("Seed", manifest.seed),
        FieldRow::new("Trees", manifest.tree_count),
        FieldRow::new("Deepest tree", max_depth),
        FieldRow::new("Leaves", leaves),
        FieldRow::new("Target", &bundle.contract.target),
    ];
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    println!();
    print_heading("Feature Contract");
    let table = Table::new(feature_rows(&bundle))
        .with(Style::rounded())
        .to_string();
    println!("{}", table);

    println!();
    print_heading("Checksums");
    let checksums: Vec<ChecksumRow> = manifest
        .checksums
        .iter()
        .map(|(file, digest)| ChecksumRow {
            file: file.clone(),
            digest: short_digest(digest),
        })
        .collect();
    let table = Table::new(checksums).with(Style::rounded()).to_string();
    println!("{}", table);

    println!();
    match &manifest.report {
        Some(report) => print_report(report),
        None => print_warning("Bundle carries no training report"),
    }

    Ok(())
}
