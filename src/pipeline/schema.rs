//! Column names of the incident export and helpers for reading them
//!
//! The export has a fixed 29-column header. Anything else is treated as
//! schema drift and stops the run.

use polars::prelude::*;

use super::error::{InStage, PipelineError, Result, Stage};

pub const DATE_COLUMN: &str = "date";
pub const INVOLVEMENT_COLUMN: &str = "personal_involvement";
/// Raw outcome field as exported
pub const RAW_OUTCOME_COLUMN: &str = "injury";
/// Derived binary outcome
pub const OUTCOME_COLUMN: &str = "injury_level";
pub const INCIDENT_OBJECT_COLUMN: &str = "incident_with";
pub const GENDER_COLUMN: &str = "gender";
/// Redundant with `i_type`
pub const REDUNDANT_COLUMN: &str = "p_type";
pub const INCIDENT_TYPE_COLUMN: &str = "i_type";

/// Header of the incident export, in file order
pub const EXPECTED_COLUMNS: [&str; 29] = [
    "X",
    "Y",
    "pk",
    "date",
    "report_date",
    "p_type",
    "i_type",
    "incident_with",
    "injury",
    "trip_purpose",
    "regular_cyclist",
    "helmet",
    "intoxicated",
    "road_conditions",
    "sightlines",
    "cars_on_roadside",
    "riding_on",
    "bike_lights",
    "terrain",
    "direction",
    "turning",
    "age",
    "birthmonth",
    "gender",
    "details",
    "impact",
    "personal_involvement",
    "witness_vehicle",
    "ebike",
];

/// Columns known to carry no signal for injury prediction:
/// spatial (`X`, `Y`), index (`pk`), temporal (`date`, `report_date`,
/// `birthmonth`), free text (`details`) and outcome-adjacent (`impact`).
pub const IRRELEVANT_COLUMNS: [&str; 8] = [
    "X",
    "Y",
    "pk",
    "date",
    "report_date",
    "birthmonth",
    "details",
    "impact",
];

/// Check that a frame carries exactly the expected header.
pub fn validate_schema(df: &DataFrame) -> Result<()> {
    let actual = column_names(df);

    if let Some(missing) = EXPECTED_COLUMNS
        .iter()
        .find(|name| !actual.iter().any(|a| a == *name))
    {
        return Err(PipelineError::schema(
            Stage::Loader,
            missing,
            "expected column not found in header",
        ));
    }

    if let Some(unexpected) = actual
        .iter()
        .find(|name| !EXPECTED_COLUMNS.contains(&name.as_str()))
    {
        return Err(PipelineError::schema(
            Stage::Loader,
            unexpected,
            "column is not part of the incident export header",
        ));
    }

    Ok(())
}

/// Column names of a frame, owned
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Read a column as optional strings, failing with a schema error if it is absent.
pub fn string_values(df: &DataFrame, column: &str, stage: Stage) -> Result<Vec<Option<String>>> {
    let col = df
        .column(column)
        .map_err(|_| PipelineError::schema(stage, column, "column not found"))?;

    let values = match col.dtype() {
        DataType::String => col
            .str()
            .in_stage(stage)?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String).in_stage(stage)?;
            cast.str()
                .in_stage(stage)?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}

/// Require a column to be present
pub fn require_column(df: &DataFrame, column: &str, stage: Stage) -> Result<()> {
    if df.column(column).is_ok() {
        Ok(())
    } else {
        Err(PipelineError::schema(stage, column, "column not found"))
    }
}
