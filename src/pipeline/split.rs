//! Stratified train/test split and cross-validation folds
//!
//! All randomness comes from one `StdRng` seeded from the configuration,
//! so the same input and seed always give the same assignment.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::config::SplitConfig;
use super::error::{PipelineError, Result, Stage};

/// Which partition a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
        }
    }
}

/// Row-to-partition mapping of a cleaned table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    partitions: Vec<Partition>,
    /// Fold index of each row; `None` for test rows
    folds: Vec<Option<usize>>,
    fold_count: usize,
}

impl SplitAssignment {
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn fold_count(&self) -> usize {
        self.fold_count
    }

    pub fn partition(&self, row: usize) -> Partition {
        self.partitions[row]
    }

    pub fn fold(&self, row: usize) -> Option<usize> {
        self.folds[row]
    }

    /// Row indices of the training partition, ascending
    pub fn train_rows(&self) -> Vec<usize> {
        self.rows_where(|p, _| p == Partition::Train)
    }

    /// Row indices of the test partition, ascending
    pub fn test_rows(&self) -> Vec<usize> {
        self.rows_where(|p, _| p == Partition::Test)
    }

    /// Row indices held out by fold `k`, ascending
    pub fn fold_rows(&self, k: usize) -> Vec<usize> {
        self.rows_where(|_, f| f == Some(k))
    }

    fn rows_where(&self, pred: impl Fn(Partition, Option<usize>) -> bool) -> Vec<usize> {
        self.partitions
            .iter()
            .zip(&self.folds)
            .enumerate()
            .filter(|(_, (p, f))| pred(**p, **f))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Group row indices by class, classes in first-encounter order.
fn strata<T: PartialEq>(labels: &[T]) -> Vec<Vec<usize>> {
    let mut keys: Vec<&T> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        match keys.iter().position(|k| *k == label) {
            Some(g) => groups[g].push(i),
            None => {
                keys.push(label);
                groups.push(vec![i]);
            }
        }
    }
    groups
}

/// Stratified split of rows labelled `labels`.
///
/// Within each class the rows are shuffled and `round(n × train_proportion)`
/// go to training. Training rows are then shuffled again per class and dealt
/// round-robin into `folds` folds; the dealing offset carries over between
/// classes so fold sizes differ by at most one.
pub fn stratified_split<T: PartialEq>(labels: &[T], config: &SplitConfig) -> Result<SplitAssignment> {
    if labels.is_empty() {
        return Err(PipelineError::integrity(
            Stage::Splitter,
            "no records left to split",
        ));
    }
    if !(config.train_proportion > 0.0 && config.train_proportion < 1.0) {
        return Err(PipelineError::config(format!(
            "train_proportion must be in (0, 1), got {}",
            config.train_proportion
        )));
    }
    if config.folds < 2 {
        return Err(PipelineError::config(format!(
            "folds must be at least 2, got {}",
            config.folds
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let groups = strata(labels);

    let mut partitions = vec![Partition::Test; labels.len()];
    let mut train_by_class: Vec<Vec<usize>> = Vec::with_capacity(groups.len());

    for mut rows in groups {
        rows.shuffle(&mut rng);
        let n_train = (rows.len() as f64 * config.train_proportion).round() as usize;
        let train: Vec<usize> = rows[..n_train].to_vec();
        for &row in &train {
            partitions[row] = Partition::Train;
        }
        train_by_class.push(train);
    }

    let n_train: usize = train_by_class.iter().map(Vec::len).sum();
    if n_train < config.folds {
        return Err(PipelineError::integrity(
            Stage::Splitter,
            format!(
                "training partition has {} rows, fewer than {} folds",
                n_train, config.folds
            ),
        ));
    }

    let mut folds = vec![None; labels.len()];
    let mut offset = 0;
    for mut rows in train_by_class {
        rows.shuffle(&mut rng);
        for (i, row) in rows.iter().enumerate() {
            folds[*row] = Some((offset + i) % config.folds);
        }
        offset = (offset + rows.len()) % config.folds;
    }

    Ok(SplitAssignment {
        partitions,
        folds,
        fold_count: config.folds,
    })
}
