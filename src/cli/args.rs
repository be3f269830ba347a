//! Command-line argument definitions using clap

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::pipeline::{parse_cutoff_date, InvolvementPolicy, PipelineConfig, Result};

/// bikeprep - Clean bicycle-incident reports into a stratified injury dataset
#[derive(Parser, Debug)]
#[command(name = "bikeprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Input file path (delimited text export with the 29-column incident header)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file path (CSV or Parquet, determined by extension).
    /// Defaults to input directory with '_cleaned' suffix (e.g., incidents.csv → incidents_cleaned.csv).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file. Flags given on the command line override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep incidents dated strictly after this day (YYYY-MM-DD). Default: 2016-11-30
    #[arg(long, value_parser = parse_cutoff_date)]
    pub cutoff_date: Option<NaiveDate>,

    /// Drop columns whose missing fraction is at or above this ratio. Default: 0.5
    #[arg(long, value_parser = validate_ratio)]
    pub missing_threshold: Option<f64>,

    /// Share of each outcome class assigned to training. Default: 0.75
    #[arg(long, value_parser = validate_proportion)]
    pub train_proportion: Option<f64>,

    /// Number of cross-validation folds within training. Default: 5
    #[arg(long, value_parser = validate_folds)]
    pub folds: Option<usize>,

    /// Minority:majority ratio targeted by training-only oversampling. Default: 0.5
    #[arg(long, value_parser = validate_ratio)]
    pub oversample_ratio: Option<f64>,

    /// Random seed for the stratified split and folds. Default: 3435
    #[arg(long)]
    pub seed: Option<u64>,

    /// How to treat a missing personal-involvement answer. Default: involved
    #[arg(long, value_enum)]
    pub missing_involvement: Option<InvolvementArg>,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show missing fractions and the p_type × i_type crosstab of a file
    Inspect {
        /// Input file path
        input: PathBuf,

        /// JSON configuration file, as accepted by the main command
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Keep incidents dated strictly after this day (YYYY-MM-DD)
        #[arg(long, value_parser = parse_cutoff_date)]
        cutoff_date: Option<NaiveDate>,
    },
}

/// Command-line spelling of [`InvolvementPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InvolvementArg {
    /// Missing answers count as personally involved (row kept)
    Involved,
    /// Missing answers count as witness-only (row dropped)
    Witness,
}

impl From<InvolvementArg> for InvolvementPolicy {
    fn from(arg: InvolvementArg) -> Self {
        match arg {
            InvolvementArg::Involved => InvolvementPolicy::MissingIsInvolved,
            InvolvementArg::Witness => InvolvementPolicy::MissingIsWitness,
        }
    }
}

impl Cli {
    /// Get the input path, if one was given.
    pub fn input(&self) -> Option<&PathBuf> {
        self.input.as_ref()
    }

    /// Get the output path, deriving from input if not explicitly provided.
    /// The derived path will be in the same directory as the input with a '_cleaned' suffix.
    pub fn output_path(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(
            self.output
                .clone()
                .unwrap_or_else(|| sibling_path(input, "cleaned", None)),
        )
    }

    /// Get the manifest path, derived from the input file.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(sibling_path(input, "manifest", Some("json")))
    }

    /// Build the effective configuration: defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = base_config(self.config.as_deref())?;

        if let Some(date) = self.cutoff_date {
            config.cutoff_date = date;
        }
        if let Some(threshold) = self.missing_threshold {
            config.missing_threshold = threshold;
        }
        if let Some(proportion) = self.train_proportion {
            config.train_proportion = proportion;
        }
        if let Some(folds) = self.folds {
            config.folds = folds;
        }
        if let Some(ratio) = self.oversample_ratio {
            config.oversample_ratio = ratio;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(policy) = self.missing_involvement {
            config.involvement_policy = policy.into();
        }

        config.validate()?;
        Ok(config)
    }
}

impl Commands {
    /// Configuration for `inspect`: defaults, then `--config`, then `--cutoff-date`
    pub fn inspect_config(
        config: Option<&Path>,
        cutoff_date: Option<NaiveDate>,
    ) -> Result<PipelineConfig> {
        let mut resolved = base_config(config)?;
        if let Some(date) = cutoff_date {
            resolved.cutoff_date = date;
        }

        resolved.validate()?;
        Ok(resolved)
    }
}

/// Defaults, overlaid by a JSON file when one is given
fn base_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path),
        None => Ok(PipelineConfig::default()),
    }
}

/// `dir/stem.ext` → `dir/stem_<suffix>.<ext>`
fn sibling_path(input: &Path, suffix: &str, extension: Option<&str>) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = extension.unwrap_or_else(|| {
        match input.extension().and_then(|e| e.to_str()) {
            Some("parquet") => "parquet",
            _ => "csv",
        }
    });
    parent.join(format!("{}_{}.{}", stem, suffix, extension))
}

/// Validator for ratios in (0, 1]
fn validate_ratio(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!("value must be in (0, 1], got {}", value))
    }
}

/// Validator for proportions in (0, 1)
fn validate_proportion(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("proportion must be in (0, 1), got {}", value))
    }
}

/// Validator for the fold count
fn validate_folds(s: &str) -> std::result::Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid fold count", s))?;

    if value >= 2 {
        Ok(value)
    } else {
        Err(format!("folds must be at least 2, got {}", value))
    }
}
