//! Shared test utilities and fixture generators

#![allow(dead_code)]

use bikeprep::pipeline::EXPECTED_COLUMNS;
use polars::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// One survey response. Columns not listed here get filler answers.
#[derive(Debug, Clone)]
pub struct IncidentRow {
    pub date: Option<&'static str>,
    pub injury: Option<&'static str>,
    pub involvement: Option<&'static str>,
    pub incident_with: Option<&'static str>,
    pub gender: Option<&'static str>,
    pub helmet: Option<&'static str>,
    pub p_type: Option<&'static str>,
}

impl Default for IncidentRow {
    fn default() -> Self {
        Self {
            date: Some("2017-06-01"),
            injury: Some("No injury"),
            involvement: Some("Yes"),
            incident_with: Some("Vehicle, side"),
            gender: Some("M"),
            helmet: Some("Y"),
            p_type: Some("collision"),
        }
    }
}

impl IncidentRow {
    pub fn injury(value: &'static str) -> Self {
        Self {
            injury: Some(value),
            ..Default::default()
        }
    }

    fn value(&self, column: &str, index: usize) -> Option<String> {
        let fixed = match column {
            "date" => self.date,
            "injury" => self.injury,
            "personal_involvement" => self.involvement,
            "incident_with" => self.incident_with,
            "gender" => self.gender,
            "helmet" => self.helmet,
            "p_type" => self.p_type,
            // never answered
            "witness_vehicle" => return None,
            "pk" => return Some(index.to_string()),
            _ => return Some(format!("{}_{}", column, index % 2)),
        };
        fixed.map(String::from)
    }
}

/// Build a frame with the full incident header from the given rows
pub fn incident_frame(rows: &[IncidentRow]) -> DataFrame {
    let columns: Vec<Column> = EXPECTED_COLUMNS
        .iter()
        .map(|name| {
            let values: Vec<Option<String>> = rows
                .iter()
                .enumerate()
                .map(|(i, row)| row.value(name, i))
                .collect();
            Column::new((*name).into(), values)
        })
        .collect();

    DataFrame::new(columns).unwrap()
}

/// Twelve responses with known characteristics:
///
/// - one dated before the default cutoff
/// - one witness-only report (`personal_involvement = "No"`)
/// - one with an unknown outcome
/// - of the remaining nine, six `not_injured` and three `injured`
/// - `witness_vehicle` is never answered (100% missing)
/// - one `helmet` and one `gender` answer are sentinels
pub fn standard_incidents() -> Vec<IncidentRow> {
    vec![
        IncidentRow::injury("No injury"),
        IncidentRow {
            incident_with: Some("Vehicle, rear end"),
            ..IncidentRow::injury("No injury")
        },
        IncidentRow {
            incident_with: Some("Another cyclist"),
            ..IncidentRow::injury("No injury")
        },
        IncidentRow {
            incident_with: Some("Skateboard"),
            gender: Some("Unknown"),
            ..IncidentRow::injury("No injury")
        },
        IncidentRow {
            helmet: Some("I don't know"),
            ..IncidentRow::injury("No injury")
        },
        IncidentRow {
            gender: Some("F"),
            ..IncidentRow::injury("No injury")
        },
        IncidentRow::injury("Injury, no treatment"),
        IncidentRow {
            incident_with: Some("Pedestrian"),
            gender: Some("F"),
            ..IncidentRow::injury("Injury, hospitalized")
        },
        IncidentRow {
            gender: Some("Other"),
            ..IncidentRow::injury("Injury, saw family doctor")
        },
        IncidentRow::injury("Unknown"),
        IncidentRow {
            date: Some("2016-06-01"),
            ..IncidentRow::injury("No injury")
        },
        IncidentRow {
            involvement: Some("No"),
            ..IncidentRow::injury("Injury, hospitalized")
        },
    ]
}

pub fn create_standard_frame() -> DataFrame {
    incident_frame(&standard_incidents())
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("incidents.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Write raw text to a file in a fresh temporary directory
pub fn create_temp_text(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    (temp_dir, path)
}

/// Assert that a DataFrame has specific columns
pub fn assert_has_columns(df: &DataFrame, expected: &[&str]) {
    let actual: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for col in expected {
        assert!(
            actual.iter().any(|c| c == *col),
            "Expected column '{}' not found in {:?}",
            col,
            actual
        );
    }
}

/// Assert that a DataFrame does not have specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected: &[&str]) {
    let actual: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for col in unexpected {
        assert!(
            !actual.iter().any(|c| c == *col),
            "Unexpected column '{}' found in {:?}",
            col,
            actual
        );
    }
}

/// Count of one level in a `(level, count)` list, zero when absent
pub fn count_of(counts: &[(String, usize)], level: &str) -> usize {
    counts
        .iter()
        .find(|(l, _)| l == level)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}
