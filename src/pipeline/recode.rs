//! Categorical recoding
//!
//! Survey answers are turned into factors (a string column plus an ordered
//! level list), the outcome and two high-cardinality fields are collapsed
//! into a few groups, "don't know" style answers become missing, and rows
//! without a known binary outcome are removed.
//!
//! The steps run in the fixed order of [`RecodeStage::ORDERED`]. Collapse
//! rules match source levels by exact string, and sentinel answers must
//! still be present when [`RecodeStage::NormalizeSentinels`] runs, so the
//! order is part of the contract.

use polars::prelude::*;

use super::error::{InStage, PipelineError, Result, Stage};
use super::schema::{
    column_names, string_values, GENDER_COLUMN, INCIDENT_OBJECT_COLUMN, OUTCOME_COLUMN,
    RAW_OUTCOME_COLUMN, REDUNDANT_COLUMN,
};

/// Answers that mean the respondent did not know. Matched exactly.
pub const SENTINEL_VALUES: [&str; 5] = [
    "I don't know",
    "Don't remember",
    "Don't Remember",
    "I don't remember",
    "Unknown",
];

pub const INJURED: &str = "injured";
pub const NOT_INJURED: &str = "not_injured";
pub const UNKNOWN_OUTCOME: &str = "unknown";

/// Raw `incident_with` levels that name a collision with a motor vehicle
pub const VEHICLE_LEVELS: [&str; 8] = [
    "Vehicle, head on",
    "Vehicle, side",
    "Vehicle, angle",
    "Vehicle, rear end",
    "Vehicle, turning right",
    "Vehicle, turning left",
    "Vehicle, passing",
    "Vehicle, open door",
];

pub const INJURY_LEVELS: [&str; 4] = [
    "Injury, no treatment",
    "Injury, saw family doctor",
    "Injury, hospital emergency visit",
    "Injury, hospitalized",
];

fn is_sentinel(value: &str) -> bool {
    SENTINEL_VALUES.contains(&value)
}

/// Ordered level set of one factor column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorLevels {
    pub column: String,
    pub levels: Vec<String>,
}

/// A frame whose columns are all factors.
///
/// Every operation returns a new table; the input is never modified.
#[derive(Debug, Clone)]
pub struct FactorTable {
    frame: DataFrame,
    levels: Vec<FactorLevels>,
}

impl FactorTable {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Factor level sets in column order
    pub fn factors(&self) -> &[FactorLevels] {
        &self.levels
    }

    pub fn levels(&self, column: &str) -> Option<&[String]> {
        self.levels
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.levels.as_slice())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.levels.iter().any(|f| f.column == column)
    }

    pub fn values(&self, column: &str) -> Result<Vec<Option<String>>> {
        string_values(&self.frame, column, Stage::Recoder)
    }

    /// Replace (or append) a column together with its level set.
    fn with_factor(&self, column: &str, values: Vec<Option<String>>, levels: Vec<String>) -> Result<Self> {
        let mut frame = self.frame.clone();
        frame
            .with_column(Column::new(column.into(), values))
            .in_stage(Stage::Recoder)?;

        let mut factors = self.levels.clone();
        match factors.iter_mut().find(|f| f.column == column) {
            Some(existing) => existing.levels = levels,
            None => factors.push(FactorLevels {
                column: column.to_string(),
                levels,
            }),
        }

        Ok(Self {
            frame,
            levels: factors,
        })
    }

    fn without_column(&self, column: &str) -> Self {
        Self {
            frame: self.frame.drop_many([column]),
            levels: self
                .levels
                .iter()
                .filter(|f| f.column != column)
                .cloned()
                .collect(),
        }
    }

    fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(Self {
            frame: self.frame.filter(&mask).in_stage(Stage::Recoder)?,
            levels: self.levels.clone(),
        })
    }
}

/// Step (a): every column becomes a factor whose levels are its distinct
/// non-missing values in encounter order.
pub fn factorize(df: &DataFrame) -> Result<FactorTable> {
    let mut frame = df.clone();
    let mut levels = Vec::with_capacity(df.width());

    for name in column_names(df) {
        let values = string_values(df, &name, Stage::Recoder)?;
        levels.push(FactorLevels {
            column: name.clone(),
            levels: encounter_order(&values),
        });
        frame
            .with_column(Column::new(name.as_str().into(), values))
            .in_stage(Stage::Recoder)?;
    }

    Ok(FactorTable { frame, levels })
}

/// Distinct non-missing values with their counts, in encounter order
fn tally(values: &[Option<String>]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values.iter().flatten() {
        match counts.iter_mut().find(|(level, _)| level == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value.clone(), 1)),
        }
    }
    counts
}

fn encounter_order(values: &[Option<String>]) -> Vec<String> {
    tally(values).into_iter().map(|(level, _)| level).collect()
}

/// What happens to a value no group claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Unclaimed values are a data-integrity error
    Reject,
    /// Unclaimed values go to this level. Sentinel answers pass through
    /// unchanged so they can be normalized to missing later.
    CatchAll(String),
}

/// A many-to-few collapse of one factor's levels
#[derive(Debug, Clone)]
pub struct CollapseRule {
    pub source: String,
    pub target: String,
    /// `(new level, source levels)` in output level order
    pub groups: Vec<(String, Vec<String>)>,
    pub fallback: Fallback,
}

fn group(level: &str, sources: &[&str]) -> (String, Vec<String>) {
    (
        level.to_string(),
        sources.iter().map(|s| s.to_string()).collect(),
    )
}

impl CollapseRule {
    /// `injury` → `injury_level` ∈ {not_injured, injured, unknown}
    pub fn outcome() -> Self {
        Self {
            source: RAW_OUTCOME_COLUMN.to_string(),
            target: OUTCOME_COLUMN.to_string(),
            groups: vec![
                group(NOT_INJURED, &["No injury"]),
                group(INJURED, &INJURY_LEVELS),
                group(UNKNOWN_OUTCOME, &SENTINEL_VALUES),
            ],
            fallback: Fallback::Reject,
        }
    }

    /// `incident_with` → {vehicle, bicyclist, pedestrian, other_level}
    pub fn incident_object() -> Self {
        Self {
            source: INCIDENT_OBJECT_COLUMN.to_string(),
            target: INCIDENT_OBJECT_COLUMN.to_string(),
            groups: vec![
                group("vehicle", &VEHICLE_LEVELS),
                group("bicyclist", &["Another cyclist"]),
                group("pedestrian", &["Pedestrian"]),
            ],
            fallback: Fallback::CatchAll("other_level".to_string()),
        }
    }

    /// `gender` → {M, F, O}
    pub fn gender() -> Self {
        Self {
            source: GENDER_COLUMN.to_string(),
            target: GENDER_COLUMN.to_string(),
            groups: vec![group("M", &["M"]), group("F", &["F"])],
            fallback: Fallback::CatchAll("O".to_string()),
        }
    }

    /// Map one raw value. `None` means no group claims it under `Fallback::Reject`.
    pub fn map_value<'a>(&'a self, value: &'a str) -> Option<&'a str> {
        if let Some((level, _)) = self
            .groups
            .iter()
            .find(|(_, sources)| sources.iter().any(|s| s == value))
        {
            return Some(level.as_str());
        }

        match &self.fallback {
            Fallback::Reject => None,
            Fallback::CatchAll(_) if is_sentinel(value) => Some(value),
            Fallback::CatchAll(other) => Some(other.as_str()),
        }
    }

    /// Apply the rule to a table, producing a new table.
    ///
    /// Output levels follow the group order, then the catch-all level,
    /// then any passed-through sentinels; unobserved levels are omitted.
    pub fn apply(&self, table: &FactorTable) -> Result<FactorTable> {
        let raw = table.values(&self.source)?;

        let mut mapped = Vec::with_capacity(raw.len());
        for value in &raw {
            let out = match value {
                None => None,
                Some(v) => Some(
                    self.map_value(v)
                        .ok_or_else(|| PipelineError::Mapping {
                            stage: Stage::Recoder,
                            column: self.source.clone(),
                            value: v.clone(),
                        })?
                        .to_string(),
                ),
            };
            mapped.push(out);
        }

        let observed = encounter_order(&mapped);
        let mut levels: Vec<String> = self
            .groups
            .iter()
            .map(|(level, _)| level.clone())
            .chain(match &self.fallback {
                Fallback::CatchAll(other) => Some(other.clone()),
                Fallback::Reject => None,
            })
            .filter(|level| observed.contains(level))
            .collect();
        for level in observed {
            if !levels.contains(&level) {
                levels.push(level);
            }
        }

        let base = if self.source == self.target {
            table.clone()
        } else {
            table.without_column(&self.source)
        };
        base.with_factor(&self.target, mapped, levels)
    }
}

/// Steps (b) through (h) of the recoder, in execution order.
///
/// Step (a), [`factorize`], builds the [`FactorTable`] these operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecodeStage {
    /// (b) Requires the raw `injury` column. Replaces it with
    /// `injury_level` ∈ {not_injured, injured, unknown}; any other value
    /// is a mapping error.
    CollapseOutcome,
    /// (c) Removes `p_type`, whose information `i_type` carries.
    DropRedundant,
    /// (d) `incident_with` → {vehicle, bicyclist, pedestrian, other_level}.
    /// No-op when the column was already dropped.
    CollapseIncidentObject,
    /// (e) `gender` → {M, F, O}. No-op when the column was already dropped.
    CollapseGender,
    /// (f) Sentinel answers become missing in every column. Must follow
    /// the collapses so sentinels they passed through are caught.
    NormalizeSentinels,
    /// (g) Prunes unobserved levels and orders the rest by descending
    /// frequency, ties in first-encounter order.
    RelevelByFrequency,
    /// (h) Keeps only rows with a known binary outcome, then prunes levels
    /// that no remaining row holds.
    DropUnknownOutcome,
}

impl RecodeStage {
    pub const ORDERED: [RecodeStage; 7] = [
        RecodeStage::CollapseOutcome,
        RecodeStage::DropRedundant,
        RecodeStage::CollapseIncidentObject,
        RecodeStage::CollapseGender,
        RecodeStage::NormalizeSentinels,
        RecodeStage::RelevelByFrequency,
        RecodeStage::DropUnknownOutcome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RecodeStage::CollapseOutcome => "collapse outcome",
            RecodeStage::DropRedundant => "drop redundant predictor",
            RecodeStage::CollapseIncidentObject => "collapse incident object",
            RecodeStage::CollapseGender => "collapse gender",
            RecodeStage::NormalizeSentinels => "normalize sentinels",
            RecodeStage::RelevelByFrequency => "relevel by frequency",
            RecodeStage::DropUnknownOutcome => "drop unknown outcome",
        }
    }

    pub fn apply(&self, table: &FactorTable) -> Result<FactorTable> {
        match self {
            RecodeStage::CollapseOutcome => CollapseRule::outcome().apply(table),
            RecodeStage::DropRedundant => Ok(table.without_column(REDUNDANT_COLUMN)),
            RecodeStage::CollapseIncidentObject => collapse_if_present(table, CollapseRule::incident_object()),
            RecodeStage::CollapseGender => collapse_if_present(table, CollapseRule::gender()),
            RecodeStage::NormalizeSentinels => normalize_sentinels(table),
            RecodeStage::RelevelByFrequency => relevel_by_frequency(table),
            RecodeStage::DropUnknownOutcome => drop_unknown_outcome(table),
        }
    }
}

fn collapse_if_present(table: &FactorTable, rule: CollapseRule) -> Result<FactorTable> {
    if table.has_column(&rule.source) {
        rule.apply(table)
    } else {
        Ok(table.clone())
    }
}

/// Replace sentinel answers with missing in every column. Idempotent.
pub fn normalize_sentinels(table: &FactorTable) -> Result<FactorTable> {
    let mut out = table.clone();
    for factor in table.factors() {
        let values: Vec<Option<String>> = table
            .values(&factor.column)?
            .into_iter()
            .map(|v| v.filter(|s| !is_sentinel(s)))
            .collect();
        let levels = factor
            .levels
            .iter()
            .filter(|l| !is_sentinel(l))
            .cloned()
            .collect();
        out = out.with_factor(&factor.column, values, levels)?;
    }
    Ok(out)
}

/// Drop unobserved levels and sort the rest by descending frequency.
///
/// Ties keep the order in which the levels first occur in the rows.
pub fn relevel_by_frequency(table: &FactorTable) -> Result<FactorTable> {
    let mut out = table.clone();
    for factor in table.factors() {
        let values = table.values(&factor.column)?;
        let mut counts = tally(&values);
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let levels = counts.into_iter().map(|(level, _)| level).collect();
        out = out.with_factor(&factor.column, values, levels)?;
    }
    Ok(out)
}

/// Keep only rows whose outcome is `injured` or `not_injured`.
pub fn drop_unknown_outcome(table: &FactorTable) -> Result<FactorTable> {
    let outcome = table.values(OUTCOME_COLUMN)?;
    let keep: Vec<bool> = outcome
        .iter()
        .map(|v| matches!(v.as_deref(), Some(INJURED) | Some(NOT_INJURED)))
        .collect();

    let filtered = table.filter_rows(&keep)?;
    prune_levels(&filtered)
}

/// Remove levels no row holds, keeping the existing order.
fn prune_levels(table: &FactorTable) -> Result<FactorTable> {
    let mut factors = Vec::with_capacity(table.factors().len());
    for factor in table.factors() {
        let observed = encounter_order(&table.values(&factor.column)?);
        factors.push(FactorLevels {
            column: factor.column.clone(),
            levels: factor
                .levels
                .iter()
                .filter(|l| observed.contains(l))
                .cloned()
                .collect(),
        });
    }
    Ok(FactorTable {
        frame: table.frame.clone(),
        levels: factors,
    })
}

/// Recoder output and what it removed
#[derive(Debug, Clone)]
pub struct Recoded {
    pub table: FactorTable,
    pub unknown_outcomes_dropped: usize,
    pub dropped_columns: Vec<String>,
}

/// Run the full recoder: factorize, then every stage of [`RecodeStage::ORDERED`].
pub fn recode(df: &DataFrame) -> Result<Recoded> {
    let initial = factorize(df)?;
    let before_columns = column_names(df);

    let mut table = initial;
    let mut rows_before_drop = table.height();
    for stage in RecodeStage::ORDERED {
        if stage == RecodeStage::DropUnknownOutcome {
            rows_before_drop = table.height();
        }
        table = stage.apply(&table)?;
    }

    verify_cleaned(&table)?;

    let after_columns = column_names(table.frame());
    let dropped_columns = before_columns
        .into_iter()
        .filter(|c| !after_columns.contains(c))
        .collect();

    Ok(Recoded {
        unknown_outcomes_dropped: rows_before_drop - table.height(),
        table,
        dropped_columns,
    })
}

/// Check the recoder's postconditions.
///
/// The outcome is present for every row and binary, and every factor's
/// levels are exactly the values its rows hold.
pub fn verify_cleaned(table: &FactorTable) -> Result<()> {
    let outcome = table.values(OUTCOME_COLUMN)?;
    if let Some(bad) = outcome
        .iter()
        .find(|v| !matches!(v.as_deref(), Some(INJURED) | Some(NOT_INJURED)))
    {
        return Err(PipelineError::integrity(
            Stage::Recoder,
            format!(
                "outcome '{}' is {:?}; expected '{}' or '{}'",
                OUTCOME_COLUMN, bad, INJURED, NOT_INJURED
            ),
        ));
    }

    for factor in table.factors() {
        let observed = encounter_order(&table.values(&factor.column)?);
        let same_set = observed.len() == factor.levels.len()
            && observed.iter().all(|o| factor.levels.contains(o));
        if !same_set {
            return Err(PipelineError::integrity(
                Stage::Recoder,
                format!(
                    "levels of '{}' {:?} do not match observed values {:?}",
                    factor.column, factor.levels, observed
                ),
            ));
        }
    }

    Ok(())
}
