//! Cross-validation splitting and fold scoring

use super::{take_rows, take_values, Estimator, Scorer};
use crate::config::ProblemClass;
use crate::error::{Result, SelectionError};
use crate::utils::Deadline;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous folds
    KFold { n_splits: usize, shuffle: bool },
    /// Folds that preserve the class distribution
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl CVStrategy {
    /// Stratified folds for classification, plain folds for regression, unshuffled
    pub fn for_problem(problem: ProblemClass, n_splits: usize) -> Self {
        match problem {
            ProblemClass::Classification => CVStrategy::StratifiedKFold { n_splits, shuffle: false },
            ProblemClass::Regression => CVStrategy::KFold { n_splits, shuffle: false },
        }
    }

    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducible shuffling
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate train/test splits over `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(SelectionError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(SelectionError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let folds = match self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => self.stratified_k_fold(y, n_splits, shuffle),
        };

        Ok(folds_to_splits(folds))
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn k_fold(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            folds.push(indices[current..current + size].to_vec());
            current += size;
        }
        folds
    }

    fn stratified_k_fold(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        // Ordered by label so fold assignment is deterministic
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal rows round-robin, continuing across classes so no fold ends up empty
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }
        folds
    }
}

fn folds_to_splits(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
    (0..folds.len())
        .map(|fold_idx| {
            let train_indices = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            CVSplit {
                train_indices,
                test_indices: folds[fold_idx].clone(),
                fold_idx,
            }
        })
        .collect()
}

/// Per-fold scores of a cross-validated estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let mean_score = if scores.is_empty() {
            f64::NAN
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        Self { scores, mean_score }
    }
}

/// Score a fresh estimator on every split.
///
/// `make` builds an unfitted estimator for each fold. When a deadline is
/// given it is polled before each fold starts; expiry aborts with
/// [`SelectionError::TimeLimitExceeded`].
pub fn cross_val_score(
    make: &dyn Fn() -> Box<dyn Estimator>,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    scorer: Scorer,
    deadline: Option<&Deadline>,
) -> Result<CVResults> {
    let mut scores = Vec::with_capacity(splits.len());
    for split in splits {
        if let Some(deadline) = deadline {
            deadline.check()?;
        }

        let x_train = take_rows(x, &split.train_indices);
        let y_train = take_values(y, &split.train_indices);
        let x_test = take_rows(x, &split.test_indices);
        let y_test = take_values(y, &split.test_indices);

        let mut estimator = make();
        estimator.fit(&x_train, &y_train)?;
        let predictions = estimator.predict(&x_test)?;
        let score = scorer.score(&y_test, &predictions)?;

        debug!(model = estimator.name(), fold = split.fold_idx, score, "Fold scored");
        scores.push(score);
    }
    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::decision_tree::DecisionTree;
    use ndarray::Array1;
    use std::time::Duration;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(&Array1::zeros(100)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_k_fold_balances_classes() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(&y).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(ones, 1);
        }
    }

    #[test]
    fn test_stratified_small_classes_no_empty_fold() {
        let y = Array1::from_vec(vec![0.0, 1.0, 2.0, 3.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false });
        let splits = cv.split(&y).unwrap();
        assert!(splits.iter().all(|s| !s.test_indices.is_empty()));
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        assert!(cv.split(&Array1::zeros(3)).is_err());
    }

    #[test]
    fn test_cross_val_score_runs_each_fold() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| if i < 15 { 0.0 } else { 1.0 });
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false })
            .split(&y)
            .unwrap();

        let make = || Box::new(DecisionTree::classifier()) as Box<dyn Estimator>;
        let results = cross_val_score(&make, &x, &y, &splits, Scorer::Accuracy, None).unwrap();
        assert_eq!(results.scores.len(), 3);
        assert!(results.mean_score > 0.8);
    }

    #[test]
    fn test_cross_val_score_honours_expired_deadline() {
        let x = Array2::from_shape_fn((9, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(9, |i| i as f64);
        let splits = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: false })
            .split(&y)
            .unwrap();
        let deadline = Deadline::arm(Some(Duration::from_nanos(1)));
        std::thread::sleep(Duration::from_millis(2));

        let make = || Box::new(DecisionTree::regressor()) as Box<dyn Estimator>;
        let err = cross_val_score(&make, &x, &y, &splits, Scorer::R2, Some(&deadline)).unwrap_err();
        assert!(err.is_time_limit());
    }
}
