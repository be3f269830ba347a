//! Incident loader for delimited text exports

use std::path::Path;

use polars::prelude::*;

use super::config::PipelineConfig;
use super::error::{InStage, PipelineError, Result, Stage};
use super::schema::{column_names, string_values, validate_schema};

/// A loaded incident table plus the statistics shown after loading
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub frame: DataFrame,
    pub rows: usize,
    pub columns: usize,
    pub memory_mb: f64,
}

/// Load an incident export and validate its header.
///
/// Every column is read as text; schema inference is disabled so survey
/// answers such as `"1"` or `"No"` keep their literal spelling. Tokens in
/// `config.missing_tokens` are turned into nulls.
pub fn load_incidents(path: &Path, config: &PipelineConfig) -> Result<LoadedDataset> {
    let frame = read_delimited(path, config)?;
    validate_schema(&frame)?;

    let (rows, columns) = frame.shape();
    let memory_mb = frame.estimated_size() as f64 / (1024.0 * 1024.0);

    Ok(LoadedDataset {
        frame,
        rows,
        columns,
        memory_mb,
    })
}

/// Read a delimited file into a frame of string columns without validating its header.
///
/// Fails with [`PipelineError::Io`] when a record's field count differs from
/// the header's; polars alone would pad a short record with nulls.
pub fn read_delimited(path: &Path, config: &PipelineConfig) -> Result<DataFrame> {
    let io_error = |source: PolarsError| PipelineError::Io {
        stage: Stage::Loader,
        path: path.to_path_buf(),
        source,
    };

    check_record_lengths(path, config.delimiter).map_err(io_error)?;

    let frame = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_separator(config.delimiter as u8)
        .with_infer_schema_length(Some(0))
        .finish()
        .map_err(io_error)?
        .collect()
        .map_err(io_error)?;

    normalize_missing_tokens(frame, &config.missing_tokens)
}

/// Scan the raw records and reject any whose field count differs from the header.
fn check_record_lengths(path: &Path, delimiter: char) -> PolarsResult<()> {
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(csv_to_polars)?;

    let mut record = ::csv::ByteRecord::new();
    while reader.read_byte_record(&mut record).map_err(csv_to_polars)? {}

    Ok(())
}

fn csv_to_polars(err: ::csv::Error) -> PolarsError {
    match err.kind() {
        ::csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
            PolarsError::ComputeError(
                format!(
                    "malformed record on line {}: {} fields, header has {}",
                    line, len, expected_len
                )
                .into(),
            )
        }
        _ => PolarsError::ComputeError(err.to_string().into()),
    }
}

/// Replace raw missing-value tokens with nulls in every column.
fn normalize_missing_tokens(mut frame: DataFrame, tokens: &[String]) -> Result<DataFrame> {
    if tokens.is_empty() {
        return Ok(frame);
    }

    for name in column_names(&frame) {
        let values: Vec<Option<String>> = string_values(&frame, &name, Stage::Loader)?
            .into_iter()
            .map(|v| v.filter(|s| !tokens.iter().any(|t| t == s)))
            .collect();
        frame
            .with_column(Column::new(name.as_str().into(), values))
            .in_stage(Stage::Loader)?;
    }

    Ok(frame)
}
