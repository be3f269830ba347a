//! `inspect` subcommand: column diagnostics for an incident export
//!
//! Prints the missing fraction of every column after selection and the
//! `p_type` × `i_type` crosstab used to judge whether `p_type` adds
//! anything once `i_type` is known.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{
    analyze_missing_values, load_incidents, select_incidents, string_values, PipelineConfig,
    Stage, INCIDENT_TYPE_COLUMN, REDUNDANT_COLUMN,
};
use crate::utils::{create_spinner, finish_with_success};

/// Two-way frequency table of two categorical columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crosstab {
    pub row_levels: Vec<String>,
    pub column_levels: Vec<String>,
    /// `counts[r][c]` for `row_levels[r]`, `column_levels[c]`
    pub counts: Vec<Vec<usize>>,
}

const MISSING_LABEL: &str = "<missing>";

/// Count co-occurrences of two equally long columns. Missing values get their own level.
pub fn crosstab(rows: &[Option<String>], columns: &[Option<String>]) -> Crosstab {
    fn level_index(levels: &mut Vec<String>, value: &Option<String>) -> usize {
        let label = value.as_deref().unwrap_or(MISSING_LABEL);
        match levels.iter().position(|l| l == label) {
            Some(i) => i,
            None => {
                levels.push(label.to_string());
                levels.len() - 1
            }
        }
    }

    let mut row_levels = Vec::new();
    let mut column_levels = Vec::new();
    let mut pairs = Vec::with_capacity(rows.len());
    for (r, c) in rows.iter().zip(columns) {
        pairs.push((
            level_index(&mut row_levels, r),
            level_index(&mut column_levels, c),
        ));
    }

    let mut counts = vec![vec![0; column_levels.len()]; row_levels.len()];
    for (r, c) in pairs {
        counts[r][c] += 1;
    }

    Crosstab {
        row_levels,
        column_levels,
        counts,
    }
}

/// Run the inspect subcommand
pub fn run_inspect(input: &Path, config: &PipelineConfig) -> Result<()> {

    println!(
        "\n {} Inspecting {}",
        style("◆").cyan().bold(),
        style(input.display()).dim()
    );
    println!();

    let spinner = create_spinner(Stage::Loader, "Loading and selecting incidents...");
    let loaded = load_incidents(input, config)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let selection = select_incidents(&loaded.frame, config).context("Selection failed")?;
    finish_with_success(
        &spinner,
        &format!(
            "{} of {} rows after {}",
            selection.frame.height(),
            loaded.rows,
            config.cutoff_date
        ),
    );

    let ratios = analyze_missing_values(&selection.frame);
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Column").add_attribute(Attribute::Bold),
        Cell::new("Missing").add_attribute(Attribute::Bold),
    ]);
    for (column, ratio) in &ratios {
        let color = if *ratio >= config.missing_threshold {
            Color::Red
        } else {
            Color::White
        };
        table.add_row(vec![
            Cell::new(column),
            Cell::new(format!("{:.1}%", ratio * 100.0)).fg(color),
        ]);
    }

    println!();
    println!("    {}", style("MISSING VALUES").white().bold());
    for line in table.to_string().lines() {
        println!("    {}", line);
    }

    let p_type = string_values(&selection.frame, REDUNDANT_COLUMN, Stage::Selector)?;
    let i_type = string_values(&selection.frame, INCIDENT_TYPE_COLUMN, Stage::Selector)?;
    let xtab = crosstab(&i_type, &p_type);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    let mut header = vec![Cell::new(format!("{} \\ {}", INCIDENT_TYPE_COLUMN, REDUNDANT_COLUMN))
        .add_attribute(Attribute::Bold)];
    header.extend(
        xtab.column_levels
            .iter()
            .map(|l| Cell::new(l).add_attribute(Attribute::Bold)),
    );
    table.set_header(header);
    for (level, counts) in xtab.row_levels.iter().zip(&xtab.counts) {
        let mut row = vec![Cell::new(level)];
        row.extend(counts.iter().map(|n| {
            if *n == 0 {
                Cell::new("·").fg(Color::DarkGrey)
            } else {
                Cell::new(n)
            }
        }));
        table.add_row(row);
    }

    println!();
    println!("    {}", style("INCIDENT TYPE CROSSTAB").white().bold());
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_crosstab_counts_pairs() {
        let rows = some(&["Collision", "Collision", "Near miss"]);
        let columns = some(&["collision", "collision", "nearmiss"]);

        let xtab = crosstab(&rows, &columns);
        assert_eq!(xtab.row_levels, vec!["Collision", "Near miss"]);
        assert_eq!(xtab.column_levels, vec!["collision", "nearmiss"]);
        assert_eq!(xtab.counts, vec![vec![2, 0], vec![0, 1]]);
    }

    #[test]
    fn test_crosstab_missing_level() {
        let rows = vec![Some("a".to_string()), None];
        let columns = vec![None, None];

        let xtab = crosstab(&rows, &columns);
        assert_eq!(xtab.row_levels, vec!["a", MISSING_LABEL]);
        assert_eq!(xtab.column_levels, vec![MISSING_LABEL]);
        assert_eq!(xtab.counts, vec![vec![1], vec![1]]);
    }
}
