//! Pipeline configuration
//!
//! Every tunable constant of the cleaning run lives here so it can be set
//! from a JSON file or the command line instead of being buried in a stage.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{PipelineError, Result};

/// Default date cutoff: only incidents strictly after this date are kept.
pub const DEFAULT_CUTOFF_DATE: &str = "2016-11-30";
pub const DEFAULT_MISSING_THRESHOLD: f64 = 0.5;
pub const DEFAULT_TRAIN_PROPORTION: f64 = 0.75;
pub const DEFAULT_FOLDS: usize = 5;
pub const DEFAULT_OVERSAMPLE_RATIO: f64 = 0.5;
pub const DEFAULT_SEED: u64 = 3435;

/// How a missing `personal_involvement` answer is treated by the Selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvolvementPolicy {
    /// Missing answers count as personally involved and the row is kept.
    #[default]
    MissingIsInvolved,
    /// Missing answers count as witness-only reports and the row is dropped.
    MissingIsWitness,
}

impl InvolvementPolicy {
    /// Whether a row should be kept given its involvement answer
    pub fn keeps(&self, answer: Option<&str>) -> bool {
        match answer {
            Some("No") => false,
            Some(_) => true,
            None => matches!(self, InvolvementPolicy::MissingIsInvolved),
        }
    }
}

/// Configuration for a cleaning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows must be dated strictly after this day
    pub cutoff_date: NaiveDate,
    /// Columns with a missing fraction at or above this value are dropped
    pub missing_threshold: f64,
    /// Share of each outcome class assigned to the training partition
    pub train_proportion: f64,
    /// Number of cross-validation folds carved out of the training partition
    pub folds: usize,
    /// Target minority:majority ratio for training-only oversampling
    pub oversample_ratio: f64,
    /// Seed for every random draw of the run
    pub seed: u64,
    pub involvement_policy: InvolvementPolicy,
    /// Field delimiter of the input file
    pub delimiter: char,
    /// Raw tokens read as missing values
    pub missing_tokens: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cutoff_date: NaiveDate::from_ymd_opt(2016, 11, 30).unwrap_or_default(),
            missing_threshold: DEFAULT_MISSING_THRESHOLD,
            train_proportion: DEFAULT_TRAIN_PROPORTION,
            folds: DEFAULT_FOLDS,
            oversample_ratio: DEFAULT_OVERSAMPLE_RATIO,
            seed: DEFAULT_SEED,
            involvement_policy: InvolvementPolicy::default(),
            delimiter: ',',
            missing_tokens: vec![String::new(), "NA".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Fields not present keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&text).map_err(|e| {
            PipelineError::config(format!("cannot parse config file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.missing_threshold > 0.0 && self.missing_threshold <= 1.0) {
            return Err(PipelineError::config(format!(
                "missing_threshold must be in (0, 1], got {}",
                self.missing_threshold
            )));
        }
        if !(self.train_proportion > 0.0 && self.train_proportion < 1.0) {
            return Err(PipelineError::config(format!(
                "train_proportion must be in (0, 1), got {}",
                self.train_proportion
            )));
        }
        if self.folds < 2 {
            return Err(PipelineError::config(format!(
                "folds must be at least 2, got {}",
                self.folds
            )));
        }
        if !(self.oversample_ratio > 0.0 && self.oversample_ratio <= 1.0) {
            return Err(PipelineError::config(format!(
                "oversample_ratio must be in (0, 1], got {}",
                self.oversample_ratio
            )));
        }
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Sampling parameters consumed by the Splitter
    pub fn split_config(&self) -> SplitConfig {
        SplitConfig {
            train_proportion: self.train_proportion,
            folds: self.folds,
            seed: self.seed,
        }
    }
}

/// Parse a `YYYY-MM-DD` date argument
pub fn parse_cutoff_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a valid date (expected YYYY-MM-DD)", s))
}

/// Parameters of the stratified split
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitConfig {
    pub train_proportion: f64,
    pub folds: usize,
    pub seed: u64,
}
