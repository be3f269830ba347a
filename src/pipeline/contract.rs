//! Data contracts with the external modeling library
//!
//! Imputation, dummy encoding, oversampling and model fitting are done by
//! an external library. This module defines what the cleaning pipeline
//! hands over: a schema shared by every partition, partition views, the
//! recipe parameters, the model families with their search grids, and the
//! shape of the tuning results that come back.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{InStage, PipelineError, Result, Stage};
use super::recode::{FactorTable, INJURED};
use super::schema::OUTCOME_COLUMN;
use super::split::{Partition, SplitAssignment};

/// A predictor and the full set of levels it can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictorSchema {
    pub name: String,
    pub levels: Vec<String>,
}

/// Column set and level universes shared by train, test and every fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelingSchema {
    pub outcome: String,
    pub outcome_levels: Vec<String>,
    pub predictors: Vec<PredictorSchema>,
}

impl ModelingSchema {
    /// Derive the schema from the full cleaned table.
    pub fn from_table(table: &FactorTable) -> Result<Self> {
        let outcome_levels = table
            .levels(OUTCOME_COLUMN)
            .ok_or_else(|| {
                PipelineError::schema(Stage::Splitter, OUTCOME_COLUMN, "outcome column not found")
            })?
            .to_vec();

        let predictors = table
            .factors()
            .iter()
            .filter(|f| f.column != OUTCOME_COLUMN)
            .map(|f| PredictorSchema {
                name: f.column.clone(),
                levels: f.levels.clone(),
            })
            .collect();

        Ok(Self {
            outcome: OUTCOME_COLUMN.to_string(),
            outcome_levels,
            predictors,
        })
    }

    pub fn predictor_names(&self) -> Vec<&str> {
        self.predictors.iter().map(|p| p.name.as_str()).collect()
    }
}

/// One record as the modeling library sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub predictors: BTreeMap<String, Option<String>>,
    pub injured: bool,
}

/// The training partition.
///
/// Only [`ModelingDataset::training_set`] builds one, which is what keeps
/// oversampling (see [`RecipeSpec::oversample_plan`]) behind the split.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    frame: DataFrame,
    outcome: Vec<String>,
}

impl TrainingSet {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    /// Row count of each outcome level, in level order of first appearance
    pub fn class_counts(&self) -> Vec<(String, usize)> {
        class_counts(&self.outcome)
    }
}

/// Analysis/assessment pair of one cross-validation fold
#[derive(Debug, Clone)]
pub struct FoldView {
    pub index: usize,
    /// Training rows outside the fold
    pub analysis: DataFrame,
    /// Training rows inside the fold
    pub assessment: DataFrame,
}

/// Cleaned, partitioned dataset handed to the modeling library
#[derive(Debug, Clone)]
pub struct ModelingDataset {
    frame: DataFrame,
    outcome: Vec<String>,
    schema: ModelingSchema,
    split: SplitAssignment,
}

impl ModelingDataset {
    pub fn new(table: FactorTable, split: SplitAssignment) -> Result<Self> {
        if split.len() != table.height() {
            return Err(PipelineError::integrity(
                Stage::Splitter,
                format!(
                    "split covers {} rows but the table has {}",
                    split.len(),
                    table.height()
                ),
            ));
        }

        let schema = ModelingSchema::from_table(&table)?;
        let outcome = table
            .values(OUTCOME_COLUMN)?
            .into_iter()
            .map(|v| v.unwrap_or_default())
            .collect();

        Ok(Self {
            frame: table.into_frame(),
            outcome,
            schema,
            split,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn schema(&self) -> &ModelingSchema {
        &self.schema
    }

    pub fn split(&self) -> &SplitAssignment {
        &self.split
    }

    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    pub fn outcome(&self) -> &[String] {
        &self.outcome
    }

    pub fn training_set(&self) -> Result<TrainingSet> {
        let rows = self.split.train_rows();
        Ok(TrainingSet {
            frame: self.take_rows(&rows)?,
            outcome: rows.iter().map(|&r| self.outcome[r].clone()).collect(),
        })
    }

    pub fn test_set(&self) -> Result<DataFrame> {
        self.take_rows(&self.split.test_rows())
    }

    /// Analysis/assessment frames of fold `index` (0-based)
    pub fn fold(&self, index: usize) -> Result<FoldView> {
        if index >= self.split.fold_count() {
            return Err(PipelineError::integrity(
                Stage::Splitter,
                format!(
                    "fold {} requested but only {} exist",
                    index,
                    self.split.fold_count()
                ),
            ));
        }

        let assessment_rows = self.split.fold_rows(index);
        let analysis_rows: Vec<usize> = self
            .split
            .train_rows()
            .into_iter()
            .filter(|r| self.split.fold(*r) != Some(index))
            .collect();

        Ok(FoldView {
            index,
            analysis: self.take_rows(&analysis_rows)?,
            assessment: self.take_rows(&assessment_rows)?,
        })
    }

    /// Outcome counts for rows of one partition
    pub fn class_counts(&self, partition: Partition) -> Vec<(String, usize)> {
        let labels: Vec<String> = (0..self.len())
            .filter(|&r| self.split.partition(r) == partition)
            .map(|r| self.outcome[r].clone())
            .collect();
        class_counts(&labels)
    }

    /// Outcome counts for rows of one fold
    pub fn fold_class_counts(&self, index: usize) -> Vec<(String, usize)> {
        let labels: Vec<String> = self
            .split
            .fold_rows(index)
            .into_iter()
            .map(|r| self.outcome[r].clone())
            .collect();
        class_counts(&labels)
    }

    /// Every record as a predictor map plus binary outcome
    pub fn records(&self) -> Result<Vec<ModelRecord>> {
        let mut columns = Vec::with_capacity(self.schema.predictors.len());
        for name in self.schema.predictor_names() {
            columns.push((
                name.to_string(),
                super::schema::string_values(&self.frame, name, Stage::Export)?,
            ));
        }

        Ok((0..self.len())
            .map(|row| ModelRecord {
                predictors: columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect(),
                injured: self.outcome[row] == INJURED,
            })
            .collect())
    }

    /// The cleaned frame with `partition` and 1-based `fold` columns appended
    pub fn labelled_frame(&self) -> Result<DataFrame> {
        let partitions: Vec<&str> = (0..self.len())
            .map(|r| self.split.partition(r).as_str())
            .collect();
        let folds: Vec<Option<u32>> = (0..self.len())
            .map(|r| self.split.fold(r).map(|f| f as u32 + 1))
            .collect();

        let mut frame = self.frame.clone();
        frame
            .with_column(Column::new("partition".into(), partitions))
            .in_stage(Stage::Export)?;
        frame
            .with_column(Column::new("fold".into(), folds))
            .in_stage(Stage::Export)?;
        Ok(frame)
    }

    fn take_rows(&self, rows: &[usize]) -> Result<DataFrame> {
        let idx = IdxCa::from_vec(
            "rows".into(),
            rows.iter().map(|&r| r as IdxSize).collect(),
        );
        self.frame.take(&idx).in_stage(Stage::Splitter)
    }
}

fn class_counts(labels: &[String]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label.clone(), 1)),
        }
    }
    counts
}

/// Missing-value imputation performed by the recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Imputation {
    /// Bagged tree ensemble using every other predictor
    BaggedTrees { trees: usize },
}

/// Categorical encoding performed by the recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Encoding {
    /// Indicator columns, one level dropped unless `one_hot`
    Dummy { one_hot: bool },
}

/// Preprocessing recipe applied by the modeling library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSpec {
    pub imputation: Imputation,
    pub encoding: Encoding,
    /// Minority:majority ratio reached by synthetic oversampling of the training partition
    pub oversample_ratio: f64,
}

impl RecipeSpec {
    pub fn new(oversample_ratio: f64) -> Self {
        Self {
            imputation: Imputation::BaggedTrees { trees: 25 },
            encoding: Encoding::Dummy { one_hot: false },
            oversample_ratio,
        }
    }

    /// How much synthetic minority data the training partition needs.
    ///
    /// Takes a [`TrainingSet`] so it cannot be applied to test or fold
    /// assessment data, nor before the split exists.
    pub fn oversample_plan(&self, train: &TrainingSet) -> Result<OversamplePlan> {
        let counts = train.class_counts();
        if counts.len() != 2 {
            return Err(PipelineError::integrity(
                Stage::Splitter,
                format!(
                    "oversampling needs exactly two outcome classes in training, found {}",
                    counts.len()
                ),
            ));
        }

        let (minority, majority) = if counts[0].1 <= counts[1].1 {
            (&counts[0], &counts[1])
        } else {
            (&counts[1], &counts[0])
        };

        let target_minority = (self.oversample_ratio * majority.1 as f64).ceil() as usize;
        Ok(OversamplePlan {
            minority_level: minority.0.clone(),
            majority_level: majority.0.clone(),
            minority_count: minority.1,
            majority_count: majority.1,
            target_minority,
            synthetic_rows: target_minority.saturating_sub(minority.1),
        })
    }
}

/// Oversampling requirement for one training partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversamplePlan {
    pub minority_level: String,
    pub majority_level: String,
    pub minority_count: usize,
    pub majority_count: usize,
    pub target_minority: usize,
    pub synthetic_rows: usize,
}

/// Classifier families compared on the cleaned data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    NearestNeighbors,
    LogisticRegression,
    ElasticNet,
    RandomForest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::NearestNeighbors,
        ModelFamily::LogisticRegression,
        ModelFamily::ElasticNet,
        ModelFamily::RandomForest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::NearestNeighbors => "k-nearest neighbors",
            ModelFamily::LogisticRegression => "logistic regression",
            ModelFamily::ElasticNet => "elastic-net logistic regression",
            ModelFamily::RandomForest => "random forest",
        }
    }

    /// Default hyperparameter search grid
    pub fn default_grid(&self) -> HyperparameterGrid {
        match self {
            ModelFamily::NearestNeighbors => {
                HyperparameterGrid::new().with("neighbors", &[5.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0])
            }
            ModelFamily::LogisticRegression => HyperparameterGrid::new(),
            ModelFamily::ElasticNet => HyperparameterGrid::new()
                .with("penalty", &[1e-4, 1e-3, 1e-2, 1e-1, 1.0])
                .with("mixture", &[0.0, 0.25, 0.5, 0.75, 1.0]),
            ModelFamily::RandomForest => HyperparameterGrid::new()
                .with("mtry", &[2.0, 4.0, 6.0, 8.0])
                .with("min_n", &[2.0, 10.0, 20.0])
                .with("trees", &[500.0]),
        }
    }
}

/// Named hyperparameters and their candidate values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterGrid {
    pub parameters: Vec<(String, Vec<f64>)>,
}

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: &[f64]) -> Self {
        self.parameters.push((name.to_string(), values.to_vec()));
        self
    }

    /// Every combination of candidate values. An empty grid has one empty candidate.
    pub fn candidates(&self) -> Vec<BTreeMap<String, f64>> {
        self.parameters
            .iter()
            .fold(vec![BTreeMap::new()], |acc, (name, values)| {
                acc.iter()
                    .flat_map(|partial| {
                        values.iter().map(move |v| {
                            let mut next = partial.clone();
                            next.insert(name.clone(), *v);
                            next
                        })
                    })
                    .collect()
            })
    }
}

/// What a family trainer reports back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub family: ModelFamily,
    pub best_parameters: BTreeMap<String, f64>,
    /// Mean ROC AUC over the folds for the best parameters
    pub cv_roc_auc: f64,
    /// ROC AUC of the refit model on the untouched test partition
    pub test_roc_auc: f64,
}

/// Implemented by the external modeling library, one per family.
///
/// An implementation tunes over `grid` using the dataset's folds, picks the
/// candidate with the highest cross-validated ROC AUC, refits on the whole
/// training partition and scores the test partition once.
pub trait FamilyTrainer {
    fn family(&self) -> ModelFamily;

    fn tune(&self, data: &ModelingDataset, grid: &HyperparameterGrid) -> anyhow::Result<TuningOutcome>;
}

/// Area under the ROC curve of `scores` for binary `labels` (`true` = positive).
///
/// Rank-sum form with average ranks for tied scores. `None` when the inputs
/// differ in length or one class is absent.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }

    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based; tied run shares the mean rank
        let mean_rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = mean_rank;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, l)| **l)
        .map(|(r, _)| r)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
