//! Cleaning manifest generation
//!
//! A JSON document written next to the cleaned dataset. It records the
//! effective configuration, what every stage removed, the modeling schema,
//! class balance per partition and fold, and the recipe and model-family
//! grids the downstream library should use.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{
    CleaningRun, HyperparameterGrid, ModelFamily, ModelingSchema, OversamplePlan, Partition,
    PipelineConfig, RecipeSpec,
};
use crate::report::CleaningSummary;

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ManifestMetadata {
    pub timestamp: String,
    pub bikeprep_version: String,
    pub input_file: String,
    pub output_file: String,
}

/// Columns removed, by the stage that removed them
#[derive(Debug, Clone, Serialize)]
pub struct DroppedColumns {
    pub selector: Vec<String>,
    pub missingness: Vec<String>,
    pub recoder: Vec<String>,
}

/// Row counts after each stage
#[derive(Debug, Clone, Serialize)]
pub struct RowCounts {
    pub loaded: usize,
    pub after_date_filter: usize,
    pub witness_reports_dropped: usize,
    pub unknown_outcomes_dropped: usize,
    pub modeled: usize,
}

/// Missing fraction of a column over the selected rows
#[derive(Debug, Clone, Serialize)]
pub struct MissingEntry {
    pub column: String,
    pub ratio: f64,
    pub dropped: bool,
}

/// Outcome balance of one partition or fold
#[derive(Debug, Clone, Serialize)]
pub struct ClassBalance {
    pub name: String,
    pub rows: usize,
    pub counts: Vec<(String, usize)>,
}

/// Search grid of one model family
#[derive(Debug, Clone, Serialize)]
pub struct FamilyEntry {
    pub family: ModelFamily,
    pub label: String,
    pub grid: HyperparameterGrid,
    pub candidates: usize,
}

/// Timing information in milliseconds
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingInfo {
    pub load_ms: u64,
    pub clean_ms: u64,
    pub split_ms: u64,
    pub total_ms: u64,
}

/// Complete cleaning manifest
#[derive(Debug, Clone, Serialize)]
pub struct CleaningManifest {
    pub metadata: ManifestMetadata,
    pub config: PipelineConfig,
    pub rows: RowCounts,
    pub dropped_columns: DroppedColumns,
    pub missing_ratios: Vec<MissingEntry>,
    pub schema: ModelingSchema,
    pub partitions: Vec<ClassBalance>,
    pub folds: Vec<ClassBalance>,
    pub recipe: RecipeSpec,
    pub oversampling: OversamplePlan,
    pub model_families: Vec<FamilyEntry>,
    pub timing: TimingInfo,
}

fn balance(name: String, counts: Vec<(String, usize)>) -> ClassBalance {
    ClassBalance {
        name,
        rows: counts.iter().map(|(_, n)| n).sum(),
        counts,
    }
}

impl CleaningManifest {
    /// Assemble the manifest of a finished run
    pub fn build(
        run: &CleaningRun,
        config: &PipelineConfig,
        input: &Path,
        output: &Path,
        summary: &CleaningSummary,
    ) -> Result<Self> {
        let dataset = &run.dataset;
        let recipe = RecipeSpec::new(config.oversample_ratio);
        let training = dataset
            .training_set()
            .context("Failed to build the training partition")?;
        let oversampling = recipe
            .oversample_plan(&training)
            .context("Failed to plan oversampling")?;

        let missing_ratios = run
            .missing
            .ratios
            .iter()
            .map(|(column, ratio)| MissingEntry {
                column: column.clone(),
                ratio: *ratio,
                dropped: run.missing.dropped_columns.contains(column),
            })
            .collect();

        let partitions = [Partition::Train, Partition::Test]
            .into_iter()
            .map(|p| balance(p.as_str().to_string(), dataset.class_counts(p)))
            .collect();

        let folds = (0..dataset.split().fold_count())
            .map(|k| balance(format!("fold_{}", k + 1), dataset.fold_class_counts(k)))
            .collect();

        let model_families = ModelFamily::ALL
            .iter()
            .map(|family| {
                let grid = family.default_grid();
                FamilyEntry {
                    family: *family,
                    label: family.label().to_string(),
                    candidates: grid.candidates().len(),
                    grid,
                }
            })
            .collect();

        Ok(Self {
            metadata: ManifestMetadata {
                timestamp: Utc::now().to_rfc3339(),
                bikeprep_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: input.display().to_string(),
                output_file: output.display().to_string(),
            },
            config: config.clone(),
            rows: RowCounts {
                loaded: run.selection.rows_before,
                after_date_filter: run.selection.rows_after_date,
                witness_reports_dropped: run.selection.witness_rows_dropped,
                unknown_outcomes_dropped: run.unknown_outcomes_dropped,
                modeled: dataset.len(),
            },
            dropped_columns: DroppedColumns {
                selector: run.selection.dropped_columns.clone(),
                missingness: run.missing.dropped_columns.clone(),
                recoder: run.recoder_dropped_columns.clone(),
            },
            missing_ratios,
            schema: dataset.schema().clone(),
            partitions,
            folds,
            recipe,
            oversampling,
            model_families,
            timing: TimingInfo {
                load_ms: summary.load_time.as_millis() as u64,
                clean_ms: summary.clean_time.as_millis() as u64,
                split_ms: summary.split_time.as_millis() as u64,
                total_ms: summary.total_time().as_millis() as u64,
            },
        })
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize cleaning manifest to JSON")
    }
}

/// Export the manifest to a JSON file
pub fn export_manifest(manifest: &CleaningManifest, output_path: &Path) -> Result<()> {
    write_manifest_json(&manifest.to_json()?, output_path)
}

/// Write an already serialized manifest
pub fn write_manifest_json(json: &str, output_path: &Path) -> Result<()> {
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write cleaning manifest to {}", output_path.display()))?;

    Ok(())
}
