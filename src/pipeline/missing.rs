//! Missing value analysis and column removal

use polars::prelude::*;

use super::config::PipelineConfig;
use super::error::{PipelineError, Result, Stage};

/// Result of resolving structurally missing columns
#[derive(Debug, Clone)]
pub struct MissingResolution {
    pub frame: DataFrame,
    /// Missing fraction of every column, sorted descending
    pub ratios: Vec<(String, f64)>,
    pub dropped_columns: Vec<String>,
}

/// Analyze missing values in the dataset.
///
/// Returns `(column, null_count / row_count)` for every column, sorted by
/// missing fraction descending. Columns with equal fractions keep their
/// frame order.
pub fn analyze_missing_values(df: &DataFrame) -> Vec<(String, f64)> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Vec::new();
    }

    let total = df.height() as f64;

    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|column| (column.name().to_string(), column.null_count() as f64 / total))
        .collect();

    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    missing_ratios
}

/// Get columns whose missing fraction is at or above `threshold`.
/// The `protected` column is never returned.
pub fn get_features_at_or_above_threshold(
    missing_ratios: &[(String, f64)],
    threshold: f64,
    protected: &str,
) -> Vec<String> {
    missing_ratios
        .iter()
        .filter(|(name, ratio)| *ratio >= threshold && name != protected)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Drop every column that is too sparse to be used.
///
/// Fractions are computed over the frame as given, so this must run on the
/// Selector's output. If the outcome column itself is too sparse the run
/// cannot produce a usable label and fails.
pub fn resolve_missing(
    df: &DataFrame,
    config: &PipelineConfig,
    outcome_column: &str,
) -> Result<MissingResolution> {
    let ratios = analyze_missing_values(df);

    if let Some((_, ratio)) = ratios
        .iter()
        .find(|(name, _)| name == outcome_column)
        .filter(|(_, ratio)| *ratio >= config.missing_threshold)
    {
        return Err(PipelineError::integrity(
            Stage::Missingness,
            format!(
                "outcome column '{}' is {:.1}% missing (threshold {:.1}%)",
                outcome_column,
                ratio * 100.0,
                config.missing_threshold * 100.0
            ),
        ));
    }

    let dropped_columns =
        get_features_at_or_above_threshold(&ratios, config.missing_threshold, outcome_column);
    let frame = df.drop_many(&dropped_columns);

    Ok(MissingResolution {
        frame,
        ratios,
        dropped_columns,
    })
}
