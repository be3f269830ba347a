//! bikeprep: Bicycle-Incident Cleaning CLI
//!
//! Turns a crowdsourced bicycle-incident export into a stratified,
//! fold-partitioned dataset with a binary injury outcome.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use polars::prelude::*;

use bikeprep::cli::{self, confirm_overwrite, Cli, Commands};
use bikeprep::pipeline::{
    clean_frame, load_incidents, RecipeSpec, RecodeStage, Stage, RAW_OUTCOME_COLUMN,
};
use bikeprep::report::{format_counts, write_manifest_json, CleaningManifest, CleaningSummary};
use bikeprep::utils::{
    create_spinner, finish_with_error, finish_with_success, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Inspect {
                input,
                config,
                cutoff_date,
            } => {
                let config = Commands::inspect_config(config.as_deref(), *cutoff_date)
                    .context("Invalid configuration")?;
                cli::inspect::run_inspect(input, &config)
            }
        };
    }

    let input = cli.input().ok_or_else(|| {
        anyhow::anyhow!("Input file is required. Use -i/--input to specify a file.")
    })?;
    let output_path = cli
        .output_path()
        .context("Could not derive an output path from the input")?;
    let manifest_path = cli
        .manifest_path()
        .context("Could not derive a manifest path from the input")?;

    let config = cli.resolve_config().context("Invalid configuration")?;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(input, &output_path, &config);

    if !cli.no_confirm && !confirm_overwrite(&[output_path.as_path(), manifest_path.as_path()])? {
        println!("Cancelled by user.");
        return Ok(());
    }

    // Step 1: Load
    print_step_header(1, "Load Incidents");
    let step_start = Instant::now();
    let spinner = create_spinner(Stage::Loader, "Reading incident export...");
    let loaded = match load_incidents(input, &config) {
        Ok(loaded) => loaded,
        Err(e) => {
            finish_with_error(&spinner, &e);
            return Err(e).with_context(|| format!("Failed to load {}", input.display()));
        }
    };
    finish_with_success(&spinner, "Dataset loaded");

    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", loaded.rows);
    println!("      Columns: {}", loaded.columns);
    println!("      Estimated memory: {:.2} MB", loaded.memory_mb);

    let mut summary = CleaningSummary::new(loaded.rows, loaded.columns);
    let load_elapsed = step_start.elapsed();
    summary.set_load_time(load_elapsed);
    print_step_time(load_elapsed);

    // Step 2: Select, resolve, recode, split
    print_step_header(2, "Clean and Split");
    let step_start = Instant::now();
    let spinner = create_spinner(Stage::Selector, "Selecting, resolving missingness, recoding...");
    let run = match clean_frame(&loaded.frame, &config) {
        Ok(run) => run,
        Err(e) => {
            finish_with_error(&spinner, &e);
            return Err(e).context("Cleaning failed; no output was written");
        }
    };
    finish_with_success(&spinner, "Cleaning complete");
    summary.record_run(&run);

    print_count(
        "record(s) after the date filter",
        run.selection.rows_after_date,
        Some(&format!("(after {})", config.cutoff_date)),
    );
    print_count("witness-only report(s) removed", run.selection.witness_rows_dropped, None);
    if run.missing.dropped_columns.is_empty() {
        print_info("No columns reach the missing value threshold");
    } else {
        print_count(
            "column(s) with high missing values",
            run.missing.dropped_columns.len(),
            Some(&format!("(≥{:.1}%)", config.missing_threshold * 100.0)),
        );
    }
    for stage in RecodeStage::ORDERED {
        println!("      {} {}", style("↳").dim(), style(stage.name()).dim());
    }
    print_count(
        &format!("record(s) without a known '{}' removed", RAW_OUTCOME_COLUMN),
        run.unknown_outcomes_dropped,
        None,
    );
    let clean_elapsed = step_start.elapsed();
    summary.set_clean_time(clean_elapsed);
    print_step_time(clean_elapsed);

    // Step 3: Partitions and recipe contract
    print_step_header(3, "Partitions");
    let step_start = Instant::now();
    let dataset = &run.dataset;
    println!("      Train: {}", format_counts(&summary.train_counts));
    println!("      Test:  {}", format_counts(&summary.test_counts));
    for k in 0..dataset.split().fold_count() {
        println!(
            "      Fold {}: {}",
            k + 1,
            format_counts(&dataset.fold_class_counts(k))
        );
    }
    let recipe = RecipeSpec::new(config.oversample_ratio);
    let plan = recipe.oversample_plan(&dataset.training_set()?)?;
    print_info(&format!(
        "Training needs {} synthetic '{}' row(s) to reach {:.0}% of '{}'",
        plan.synthetic_rows,
        plan.minority_level,
        config.oversample_ratio * 100.0,
        plan.majority_level
    ));
    let split_elapsed = step_start.elapsed();
    summary.set_split_time(split_elapsed);
    print_step_time(split_elapsed);

    // Step 4: Save output
    print_step_header(4, "Save Results");
    let step_start = Instant::now();
    let spinner = create_spinner(Stage::Export, "Writing output files...");
    let mut labelled = dataset.labelled_frame()?;
    let manifest = CleaningManifest::build(&run, &config, input, &output_path, &summary)?;
    let manifest_json = manifest.to_json()?;

    // A dataset without its manifest is partial output
    let written = save_dataset(&mut labelled, &output_path)
        .and_then(|_| write_manifest_json(&manifest_json, &manifest_path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&output_path);
        spinner.abandon_with_message("❌ Failed to write output files");
        return Err(e);
    }
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));
    print_success(&format!("Manifest written to {}", manifest_path.display()));
    let save_elapsed = step_start.elapsed();
    summary.set_save_time(save_elapsed);
    print_step_time(save_elapsed);

    // Display summary
    summary.display();

    // Final completion message
    print_completion();

    Ok(())
}

/// Save dataset to file (CSV or Parquet based on extension)
fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}
