//! Error types for the cleaning pipeline.
//!
//! Every variant records the [`Stage`] that raised it so a failed run can
//! report where it stopped and which column or value was responsible.
//! All variants are fatal: the pipeline produces no partial output.

use std::fmt;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Pipeline stage, used to label errors and progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Loader,
    Selector,
    Missingness,
    Recoder,
    Splitter,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Loader => "loader",
            Stage::Selector => "selector",
            Stage::Missingness => "missingness",
            Stage::Recoder => "recoder",
            Stage::Splitter => "splitter",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Errors raised by the cleaning pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file could not be read or is malformed.
    #[error("[{stage}] failed to read '{}': {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    /// An expected column is missing, unexpected, or holds values of the wrong shape.
    #[error("[{stage}] schema error in column '{column}': {message}")]
    Schema {
        stage: Stage,
        column: String,
        message: String,
    },

    /// A categorical value matched no collapse group and the rule has no catch-all.
    #[error("[{stage}] value '{value}' in column '{column}' does not map to any group")]
    Mapping {
        stage: Stage,
        column: String,
        value: String,
    },

    /// A post-stage invariant does not hold.
    #[error("[{stage}] integrity check failed: {message}")]
    Integrity { stage: Stage, message: String },

    /// A configuration value is out of range.
    #[error("[{stage}] invalid configuration: {message}")]
    Config { stage: Stage, message: String },

    /// A dataframe operation failed inside a stage.
    #[error("[{stage}] dataframe operation failed: {source}")]
    Frame {
        stage: Stage,
        #[source]
        source: PolarsError,
    },
}

impl PipelineError {
    /// Stage the error was raised in
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Io { stage, .. }
            | PipelineError::Schema { stage, .. }
            | PipelineError::Mapping { stage, .. }
            | PipelineError::Integrity { stage, .. }
            | PipelineError::Config { stage, .. }
            | PipelineError::Frame { stage, .. } => *stage,
        }
    }

    pub(crate) fn schema(stage: Stage, column: &str, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            stage,
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn integrity(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::Integrity {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        PipelineError::Config {
            stage: Stage::Config,
            message: message.into(),
        }
    }
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Attach a stage to polars results.
pub(crate) trait InStage<T> {
    fn in_stage(self, stage: Stage) -> Result<T>;
}

impl<T> InStage<T> for std::result::Result<T, PolarsError> {
    fn in_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|source| PipelineError::Frame { stage, source })
    }
}
