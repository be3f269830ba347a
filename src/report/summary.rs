//! Cleaning summary report generation

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{CleaningRun, Partition};

/// Summary of a cleaning run
#[derive(Debug, Default)]
pub struct CleaningSummary {
    pub loaded_rows: usize,
    pub initial_columns: usize,
    pub rows_after_date: usize,
    pub witness_rows_dropped: usize,
    pub unknown_outcomes_dropped: usize,
    pub modeled_rows: usize,
    pub dropped_selector: Vec<String>,
    pub dropped_missing: Vec<String>,
    pub dropped_recoder: Vec<String>,
    pub predictors: usize,
    pub train_counts: Vec<(String, usize)>,
    pub test_counts: Vec<(String, usize)>,
    pub folds: usize,
    pub load_time: Duration,
    pub clean_time: Duration,
    pub split_time: Duration,
    pub save_time: Duration,
}

impl CleaningSummary {
    pub fn new(loaded_rows: usize, initial_columns: usize) -> Self {
        Self {
            loaded_rows,
            initial_columns,
            ..Default::default()
        }
    }

    /// Record the stage results of a finished run
    pub fn record_run(&mut self, run: &CleaningRun) {
        self.rows_after_date = run.selection.rows_after_date;
        self.witness_rows_dropped = run.selection.witness_rows_dropped;
        self.unknown_outcomes_dropped = run.unknown_outcomes_dropped;
        self.modeled_rows = run.dataset.len();
        self.dropped_selector = run.selection.dropped_columns.clone();
        self.dropped_missing = run.missing.dropped_columns.clone();
        self.dropped_recoder = run.recoder_dropped_columns.clone();
        self.predictors = run.dataset.schema().predictors.len();
        self.train_counts = run.dataset.class_counts(Partition::Train);
        self.test_counts = run.dataset.class_counts(Partition::Test);
        self.folds = run.dataset.split().fold_count();
    }

    pub fn set_load_time(&mut self, duration: Duration) {
        self.load_time = duration;
    }

    pub fn set_clean_time(&mut self, duration: Duration) {
        self.clean_time = duration;
    }

    pub fn set_split_time(&mut self, duration: Duration) {
        self.split_time = duration;
    }

    pub fn set_save_time(&mut self, duration: Duration) {
        self.save_time = duration;
    }

    pub fn total_time(&self) -> Duration {
        self.load_time + self.clean_time + self.split_time + self.save_time
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("CLEANING SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![
            Cell::new("📁 Loaded Records"),
            Cell::new(self.loaded_rows),
        ]);
        table.add_row(vec![
            Cell::new("📅 After Date Filter"),
            Cell::new(self.rows_after_date),
        ]);
        table.add_row(vec![
            Cell::new("👀 Witness Reports Dropped"),
            drop_cell(self.witness_rows_dropped),
        ]);
        table.add_row(vec![
            Cell::new("❔ Unknown Outcomes Dropped"),
            drop_cell(self.unknown_outcomes_dropped),
        ]);
        table.add_row(vec![
            Cell::new("✅ Modeled Records"),
            Cell::new(self.modeled_rows)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("🧮 Predictors"),
            Cell::new(format!("{} of {}", self.predictors, self.initial_columns)),
        ]);
        table.add_row(vec![
            Cell::new("🏋️  Train"),
            Cell::new(format_counts(&self.train_counts)),
        ]);
        table.add_row(vec![
            Cell::new("🧪 Test"),
            Cell::new(format_counts(&self.test_counts)),
        ]);
        table.add_row(vec![
            Cell::new("🔁 CV Folds"),
            Cell::new(self.folds),
        ]);
        table.add_row(vec![
            Cell::new("⏱️  Total Time"),
            Cell::new(format!("{:.2}s", self.total_time().as_secs_f64())),
        ]);

        // Indent the table
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        let groups = [
            ("Irrelevant / Witness", &self.dropped_selector),
            ("High Missing Values", &self.dropped_missing),
            ("Recoded Away", &self.dropped_recoder),
        ];

        if groups.iter().any(|(_, cols)| !cols.is_empty()) {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("DROPPED COLUMNS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());

            for (title, columns) in groups {
                if columns.is_empty() {
                    continue;
                }
                println!();
                println!(
                    "      {} {}:",
                    style(title).yellow(),
                    style(format!("({})", columns.len())).dim()
                );
                for column in columns {
                    println!("        {} {}", style("•").dim(), column);
                }
            }
        }
    }
}

fn drop_cell(count: usize) -> Cell {
    Cell::new(count).fg(if count == 0 { Color::White } else { Color::Red })
}

/// `injured 120 / not_injured 480`
pub fn format_counts(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(level, n)| format!("{} {}", level, n))
        .collect::<Vec<_>>()
        .join(" / ")
}
