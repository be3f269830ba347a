//! Tests for CLI argument parsing, configuration layering and the binary

use assert_cmd::Command;
use bikeprep::cli::{Cli, Commands, InvolvementArg};
use bikeprep::pipeline::{InvolvementPolicy, PipelineConfig};
use chrono::NaiveDate;
use clap::Parser;
use polars::prelude::{CsvWriter, SerWriter};
use predicates::prelude::*;
use std::path::PathBuf;

#[path = "common/mod.rs"]
mod common;

use common::{create_standard_frame, create_temp_csv, create_temp_text};

#[test]
fn test_cli_defaults_leave_overrides_unset() {
    let cli = Cli::parse_from(["bikeprep", "-i", "incidents.csv"]);

    assert!(cli.command.is_none());
    assert!(cli.cutoff_date.is_none());
    assert!(cli.missing_threshold.is_none());
    assert!(cli.folds.is_none());
    assert!(cli.seed.is_none());
    assert!(!cli.no_confirm, "Default no_confirm should be false");

    let config = cli.resolve_config().unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn test_cli_overrides() {
    let cli = Cli::parse_from([
        "bikeprep",
        "-i",
        "incidents.csv",
        "--cutoff-date",
        "2018-01-01",
        "--missing-threshold",
        "0.3",
        "--train-proportion",
        "0.8",
        "--folds",
        "10",
        "--oversample-ratio",
        "1.0",
        "--seed",
        "42",
        "--missing-involvement",
        "witness",
    ]);

    let config = cli.resolve_config().unwrap();
    assert_eq!(config.cutoff_date, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
    assert_eq!(config.missing_threshold, 0.3);
    assert_eq!(config.train_proportion, 0.8);
    assert_eq!(config.folds, 10);
    assert_eq!(config.oversample_ratio, 1.0);
    assert_eq!(config.seed, 42);
    assert_eq!(config.involvement_policy, InvolvementPolicy::MissingIsWitness);
    assert_eq!(cli.missing_involvement, Some(InvolvementArg::Witness));
}

#[test]
fn test_config_file_then_flags() {
    let (_dir, config_path) = create_temp_text(
        "bikeprep.json",
        r#"{ "seed": 7, "folds": 3, "missing_threshold": 0.4 }"#,
    );

    let cli = Cli::parse_from([
        "bikeprep",
        "-i",
        "incidents.csv",
        "-c",
        config_path.to_str().unwrap(),
        "--seed",
        "99",
    ]);

    let config = cli.resolve_config().unwrap();
    assert_eq!(config.seed, 99, "flag should win over file");
    assert_eq!(config.folds, 3, "file should win over default");
    assert_eq!(config.missing_threshold, 0.4);
    assert_eq!(config.train_proportion, 0.75);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let (_dir, config_path) = create_temp_text("bad.json", r#"{ "folds": 1 }"#);

    let cli = Cli::parse_from([
        "bikeprep",
        "-i",
        "incidents.csv",
        "-c",
        config_path.to_str().unwrap(),
    ]);

    assert!(cli.resolve_config().is_err());
}

#[test]
fn test_invalid_flags_fail_to_parse() {
    assert!(Cli::try_parse_from(["bikeprep", "-i", "a.csv", "--folds", "1"]).is_err());
    assert!(Cli::try_parse_from(["bikeprep", "-i", "a.csv", "--train-proportion", "1.0"]).is_err());
    assert!(Cli::try_parse_from(["bikeprep", "-i", "a.csv", "--missing-threshold", "0"]).is_err());
    assert!(Cli::try_parse_from(["bikeprep", "-i", "a.csv", "--cutoff-date", "30/11/2016"]).is_err());
}

#[test]
fn test_output_path_derivation() {
    let cli = Cli::parse_from(["bikeprep", "-i", "/path/to/incidents.csv"]);

    assert_eq!(
        cli.output_path().unwrap(),
        PathBuf::from("/path/to/incidents_cleaned.csv")
    );
    assert_eq!(
        cli.manifest_path().unwrap(),
        PathBuf::from("/path/to/incidents_manifest.json")
    );
}

#[test]
fn test_explicit_output_path() {
    let cli = Cli::parse_from(["bikeprep", "-i", "incidents.csv", "-o", "clean.parquet"]);

    assert_eq!(cli.output_path().unwrap(), PathBuf::from("clean.parquet"));
}

#[test]
fn test_no_input_has_no_output_path() {
    let cli = Cli::parse_from(["bikeprep"]);

    assert!(cli.input().is_none());
    assert!(cli.output_path().is_none());
}

#[test]
fn test_inspect_subcommand_parses() {
    let cli = Cli::parse_from(["bikeprep", "inspect", "incidents.csv", "--cutoff-date", "2017-01-01"]);

    match cli.command {
        Some(Commands::Inspect {
            input,
            config,
            cutoff_date,
        }) => {
            assert_eq!(input, PathBuf::from("incidents.csv"));
            assert!(config.is_none());
            assert_eq!(cutoff_date, NaiveDate::from_ymd_opt(2017, 1, 1));
        }
        other => panic!("Expected inspect, got {:?}", other),
    }
}

#[test]
fn test_binary_writes_dataset_and_manifest() {
    let mut df = create_standard_frame();
    let (dir, path) = create_temp_csv(&mut df);

    Command::cargo_bin("bikeprep")
        .unwrap()
        .args(["-i", path.to_str().unwrap(), "--no-confirm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaning complete"));

    let output = dir.path().join("incidents_cleaned.csv");
    let manifest = dir.path().join("incidents_manifest.json");
    assert!(output.exists(), "cleaned dataset not written");
    assert!(manifest.exists(), "manifest not written");

    let header = std::fs::read_to_string(&output).unwrap();
    let header = header.lines().next().unwrap();
    assert!(header.contains("injury_level"));
    assert!(header.contains("partition"));
    assert!(header.ends_with("fold"));
}

#[test]
fn test_binary_fails_on_schema_drift() {
    let mut df = create_standard_frame().drop("ebike").unwrap();
    let (dir, path) = create_temp_csv(&mut df);

    Command::cargo_bin("bikeprep")
        .unwrap()
        .args(["-i", path.to_str().unwrap(), "--no-confirm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ebike"));

    assert!(!dir.path().join("incidents_cleaned.csv").exists());
}

#[test]
fn test_binary_requires_input() {
    Command::cargo_bin("bikeprep")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file is required"));
}

#[test]
fn test_inspect_subcommand_runs() {
    let mut df = create_standard_frame();
    let (_dir, path) = create_temp_csv(&mut df);

    Command::cargo_bin("bikeprep")
        .unwrap()
        .args(["inspect", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("MISSING VALUES"))
        .stdout(predicate::str::contains("witness_vehicle"));
}

#[test]
fn test_binary_leaves_no_dataset_when_manifest_fails() {
    let mut df = create_standard_frame();
    let (dir, path) = create_temp_csv(&mut df);
    // A directory where the manifest should go makes the manifest write fail
    std::fs::create_dir(dir.path().join("incidents_manifest.json")).unwrap();

    Command::cargo_bin("bikeprep")
        .unwrap()
        .args(["-i", path.to_str().unwrap(), "--no-confirm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest"));

    assert!(!dir.path().join("incidents_cleaned.csv").exists());
}

#[test]
fn test_inspect_config_layers_file_then_flag() {
    let (_dir, config_path) = create_temp_text(
        "bikeprep.json",
        r#"{ "delimiter": ";", "cutoff_date": "2017-05-01" }"#,
    );

    let from_file = Commands::inspect_config(Some(config_path.as_path()), None).unwrap();
    assert_eq!(from_file.delimiter, ';');
    assert_eq!(from_file.cutoff_date, NaiveDate::from_ymd_opt(2017, 5, 1).unwrap());

    let flagged = Commands::inspect_config(
        Some(config_path.as_path()),
        NaiveDate::from_ymd_opt(2018, 1, 1),
    )
    .unwrap();
    assert_eq!(flagged.delimiter, ';');
    assert_eq!(flagged.cutoff_date, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());

    assert_eq!(
        Commands::inspect_config(None, None).unwrap(),
        PipelineConfig::default()
    );
}

#[test]
fn test_inspect_reads_semicolon_file_with_config() {
    let mut df = create_standard_frame();
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("incidents.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file)
        .with_separator(b';')
        .finish(&mut df)
        .unwrap();
    let config_path = dir.path().join("bikeprep.json");
    std::fs::write(&config_path, r#"{ "delimiter": ";" }"#).unwrap();

    Command::cargo_bin("bikeprep")
        .unwrap()
        .args(["inspect", path.to_str().unwrap()])
        .assert()
        .failure();

    Command::cargo_bin("bikeprep")
        .unwrap()
        .args([
            "inspect",
            path.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("witness_vehicle"));
}
