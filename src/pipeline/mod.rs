//! Pipeline module - the cleaning stages and the driver that chains them
//!
//! Loader → Selector → Missingness Resolver → Recoder → Splitter. Each
//! stage takes the previous stage's table and returns a new one.

pub mod config;
pub mod contract;
pub mod error;
pub mod loader;
pub mod missing;
pub mod recode;
pub mod schema;
pub mod selector;
pub mod split;

use std::path::Path;

use polars::prelude::DataFrame;

pub use config::*;
pub use contract::*;
pub use error::{PipelineError, Result, Stage};
pub use loader::*;
pub use missing::*;
pub use recode::*;
pub use schema::*;
pub use selector::*;
pub use split::*;

/// Everything a cleaning run produced, stage by stage
#[derive(Debug, Clone)]
pub struct CleaningRun {
    pub selection: Selection,
    pub missing: MissingResolution,
    pub recoded_rows: usize,
    pub unknown_outcomes_dropped: usize,
    pub recoder_dropped_columns: Vec<String>,
    pub dataset: ModelingDataset,
}

/// Run the Selector, Resolver, Recoder and Splitter over a loaded frame.
pub fn clean_frame(frame: &DataFrame, config: &PipelineConfig) -> Result<CleaningRun> {
    config.validate()?;

    let selection = select_incidents(frame, config)?;
    let missing = resolve_missing(&selection.frame, config, RAW_OUTCOME_COLUMN)?;
    let recoded = recode(&missing.frame)?;

    let outcome = recoded.table.values(OUTCOME_COLUMN)?;
    let split = stratified_split(&outcome, &config.split_config())?;
    let recoded_rows = recoded.table.height();
    let dataset = ModelingDataset::new(recoded.table, split)?;

    Ok(CleaningRun {
        selection,
        missing,
        recoded_rows,
        unknown_outcomes_dropped: recoded.unknown_outcomes_dropped,
        recoder_dropped_columns: recoded.dropped_columns,
        dataset,
    })
}

/// Load an incident export and run every cleaning stage on it.
pub fn run_cleaning(path: &Path, config: &PipelineConfig) -> Result<CleaningRun> {
    config.validate()?;
    let loaded = load_incidents(path, config)?;
    clean_frame(&loaded.frame, config)
}
