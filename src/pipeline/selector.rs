//! Row and column selection
//!
//! Keeps incidents reported after the cutoff date, removes columns that
//! carry no signal for injury prediction, and removes witness-only reports.

use chrono::NaiveDate;
use polars::prelude::*;

use super::config::{InvolvementPolicy, PipelineConfig};
use super::error::{InStage, PipelineError, Result, Stage};
use super::schema::{
    column_names, require_column, string_values, DATE_COLUMN, INVOLVEMENT_COLUMN,
    IRRELEVANT_COLUMNS,
};

/// Output of the Selector and what it removed
#[derive(Debug, Clone)]
pub struct Selection {
    pub frame: DataFrame,
    pub rows_before: usize,
    pub rows_after_date: usize,
    pub witness_rows_dropped: usize,
    pub dropped_columns: Vec<String>,
}

/// Apply the date filter, the fixed column drop list and the involvement filter.
pub fn select_incidents(df: &DataFrame, config: &PipelineConfig) -> Result<Selection> {
    require_column(df, DATE_COLUMN, Stage::Selector)?;
    require_column(df, INVOLVEMENT_COLUMN, Stage::Selector)?;

    let rows_before = df.height();

    let dated = filter_after_date(df, config.cutoff_date)?;
    let rows_after_date = dated.height();

    let present = column_names(&dated);
    let mut dropped_columns: Vec<String> = IRRELEVANT_COLUMNS
        .iter()
        .filter(|name| present.iter().any(|p| p == *name))
        .map(|name| name.to_string())
        .collect();
    let trimmed = dated.drop_many(&dropped_columns);

    let involved = filter_involved(&trimmed, config.involvement_policy)?;
    let witness_rows_dropped = trimmed.height() - involved.height();
    let frame = involved.drop_many([INVOLVEMENT_COLUMN]);
    dropped_columns.push(INVOLVEMENT_COLUMN.to_string());

    Ok(Selection {
        frame,
        rows_before,
        rows_after_date,
        witness_rows_dropped,
        dropped_columns,
    })
}

/// Keep rows dated strictly after `cutoff`. Rows without a date are dropped.
pub fn filter_after_date(df: &DataFrame, cutoff: NaiveDate) -> Result<DataFrame> {
    let dates = string_values(df, DATE_COLUMN, Stage::Selector)?;

    let mut keep = Vec::with_capacity(dates.len());
    for value in &dates {
        let after = match value {
            Some(raw) => parse_incident_date(raw)? > cutoff,
            None => false,
        };
        keep.push(after);
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    df.filter(&mask).in_stage(Stage::Selector)
}

/// Drop witness-only reports according to the involvement policy.
pub fn filter_involved(df: &DataFrame, policy: InvolvementPolicy) -> Result<DataFrame> {
    let answers = string_values(df, INVOLVEMENT_COLUMN, Stage::Selector)?;
    let keep: Vec<bool> = answers.iter().map(|a| policy.keeps(a.as_deref())).collect();

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    df.filter(&mask).in_stage(Stage::Selector)
}

/// Parse the calendar day of an incident timestamp.
///
/// Accepts `YYYY-MM-DD` optionally followed by a time part
/// (`2017-03-01T14:30:00`, `2017-03-01 14:30:00`).
pub fn parse_incident_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
        PipelineError::schema(
            Stage::Selector,
            DATE_COLUMN,
            format!("'{}' is not a YYYY-MM-DD date", raw),
        )
    })
}
