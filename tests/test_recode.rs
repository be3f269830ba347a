//! Tests for categorical recoding

use bikeprep::pipeline::{
    factorize, normalize_sentinels, recode, resolve_missing, select_incidents, verify_cleaned,
    CollapseRule, PipelineConfig, PipelineError, RecodeStage, Stage, INJURED, NOT_INJURED,
    OUTCOME_COLUMN, RAW_OUTCOME_COLUMN, SENTINEL_VALUES,
};
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::{assert_has_columns, assert_missing_columns, create_standard_frame};

fn create_survey_dataframe() -> DataFrame {
    df! {
        "injury" => ["No injury", "Injury, hospitalized", "I don't know", "No injury", "Injury, no treatment", "No injury"],
        "p_type" => ["collision", "collision", "fall", "collision", "fall", "collision"],
        "incident_with" => ["Vehicle, side", "Pedestrian", "Vehicle, angle", "I don't know", "Another cyclist", "Lamp post"],
        "gender" => ["M", "F", "M", "Don't remember", "Other", "M"],
        "helmet" => ["Y", "Unknown", "N", "Y", "Don't Remember", "Y"],
    }
    .unwrap()
}

/// Standard fixture after the Selector and Resolver
fn resolved_standard_frame() -> DataFrame {
    let config = PipelineConfig::default();
    let selection = select_incidents(&create_standard_frame(), &config).unwrap();
    resolve_missing(&selection.frame, &config, RAW_OUTCOME_COLUMN)
        .unwrap()
        .frame
}

#[test]
fn test_outcome_is_binary_after_recode() {
    let recoded = recode(&create_survey_dataframe()).unwrap();

    let outcome = recoded.table.values(OUTCOME_COLUMN).unwrap();
    assert_eq!(outcome.len(), 5);
    assert!(outcome
        .iter()
        .all(|v| matches!(v.as_deref(), Some(INJURED) | Some(NOT_INJURED))));
    assert_eq!(recoded.unknown_outcomes_dropped, 1);
    assert_eq!(
        recoded.table.levels(OUTCOME_COLUMN).unwrap(),
        &[NOT_INJURED, INJURED]
    );
}

#[test]
fn test_raw_outcome_and_redundant_columns_removed() {
    let recoded = recode(&create_survey_dataframe()).unwrap();

    assert_missing_columns(recoded.table.frame(), &["injury", "p_type"]);
    assert_has_columns(recoded.table.frame(), &[OUTCOME_COLUMN, "incident_with", "gender"]);
    assert!(recoded.dropped_columns.contains(&"p_type".to_string()));
    assert!(recoded.dropped_columns.contains(&"injury".to_string()));
}

#[test]
fn test_incident_object_collapse() {
    let recoded = recode(&create_survey_dataframe()).unwrap();

    let values = recoded.table.values("incident_with").unwrap();
    // the "I don't know" outcome row is gone; its incident_with was a vehicle
    assert_eq!(
        values,
        vec![
            Some("vehicle".to_string()),
            Some("pedestrian".to_string()),
            None,
            Some("bicyclist".to_string()),
            Some("other_level".to_string()),
        ]
    );
}

#[test]
fn test_sentinels_are_missing_in_every_column() {
    let recoded = recode(&create_survey_dataframe()).unwrap();

    for factor in recoded.table.factors() {
        for value in recoded.table.values(&factor.column).unwrap().into_iter().flatten() {
            assert!(
                !SENTINEL_VALUES.contains(&value.as_str()),
                "sentinel '{}' survived in '{}'",
                value,
                factor.column
            );
        }
        for level in &factor.levels {
            assert!(!SENTINEL_VALUES.contains(&level.as_str()));
        }
    }

    let gender = recoded.table.values("gender").unwrap();
    assert_eq!(gender[2], None);
    assert_eq!(gender[3].as_deref(), Some("O"));
}

#[test]
fn test_normalize_sentinels_is_idempotent() {
    let table = factorize(&create_survey_dataframe()).unwrap();

    let once = normalize_sentinels(&table).unwrap();
    let twice = normalize_sentinels(&once).unwrap();

    assert!(once.frame().equals_missing(twice.frame()));
    assert_eq!(once.factors(), twice.factors());
}

#[test]
fn test_unmapped_outcome_is_mapping_error() {
    let df = df! {
        "injury" => ["No injury", "Bruised ego"],
    }
    .unwrap();

    let err = recode(&df).unwrap_err();

    match err {
        PipelineError::Mapping {
            stage,
            column,
            value,
        } => {
            assert_eq!(stage, Stage::Recoder);
            assert_eq!(column, "injury");
            assert_eq!(value, "Bruised ego");
        }
        other => panic!("Expected a mapping error, got {:?}", other),
    }
}

#[test]
fn test_missing_optional_columns_are_skipped() {
    let df = df! {
        "injury" => ["No injury", "Injury, hospitalized"],
        "helmet" => ["Y", "N"],
    }
    .unwrap();

    let recoded = recode(&df).unwrap();

    assert_eq!(recoded.table.height(), 2);
    assert_missing_columns(recoded.table.frame(), &["incident_with", "gender"]);
}

#[test]
fn test_missing_outcome_column_is_schema_error() {
    let df = df! { "helmet" => ["Y"] }.unwrap();

    let err = recode(&df).unwrap_err();

    assert!(matches!(err, PipelineError::Schema { .. }), "got {:?}", err);
}

#[test]
fn test_levels_ordered_by_frequency() {
    let recoded = recode(&resolved_standard_frame()).unwrap();
    let table = &recoded.table;

    assert_eq!(
        table.levels("incident_with").unwrap(),
        &["vehicle", "bicyclist", "other_level", "pedestrian"]
    );
    assert_eq!(table.levels("gender").unwrap(), &["M", "F", "O"]);
    assert_eq!(table.levels("helmet").unwrap(), &["Y"]);
    assert_eq!(table.levels(OUTCOME_COLUMN).unwrap(), &[NOT_INJURED, INJURED]);
}

#[test]
fn test_standard_frame_recode_counts() {
    let recoded = recode(&resolved_standard_frame()).unwrap();

    assert_eq!(recoded.table.height(), 9);
    assert_eq!(recoded.unknown_outcomes_dropped, 1);
    // 20 selected columns, minus witness_vehicle, minus p_type
    assert_eq!(recoded.table.frame().width(), 18);
    assert!(verify_cleaned(&recoded.table).is_ok());
}

#[test]
fn test_collapse_rule_keeps_input_unchanged() {
    let table = factorize(&create_survey_dataframe()).unwrap();
    let before = table.frame().clone();

    let collapsed = CollapseRule::gender().apply(&table).unwrap();

    assert!(table.frame().equals_missing(&before));
    assert_eq!(
        collapsed.levels("gender").unwrap(),
        &["M", "F", "O", "Don't remember"]
    );
}

#[test]
fn test_verify_cleaned_rejects_unknown_outcome() {
    let df = df! {
        "injury" => ["No injury", "Unknown"],
    }
    .unwrap();
    let table = factorize(&df).unwrap();
    let collapsed = RecodeStage::CollapseOutcome.apply(&table).unwrap();

    let err = verify_cleaned(&collapsed).unwrap_err();

    assert!(matches!(err, PipelineError::Integrity { .. }));
}

#[test]
fn test_stage_order() {
    let names: Vec<&str> = RecodeStage::ORDERED.iter().map(|s| s.name()).collect();
    assert_eq!(names.first(), Some(&"collapse outcome"));
    assert_eq!(names.last(), Some(&"drop unknown outcome"));
    let normalize = names.iter().position(|n| *n == "normalize sentinels").unwrap();
    let gender = names.iter().position(|n| *n == "collapse gender").unwrap();
    assert!(gender < normalize);
}
