//! Bagged tree ensembles: random forests, extra trees and bagging

use super::decision_tree::{DecisionTree, MaxFeatures};
use super::{check_fit_input, class_labels, class_index, take_rows, take_values, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Which ensemble recipe to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleKind {
    RandomForestClassifier,
    RandomForestRegressor,
    ExtraTreesClassifier,
    ExtraTreesRegressor,
    BaggingRegressor,
}

impl EnsembleKind {
    fn is_classification(&self) -> bool {
        matches!(
            self,
            EnsembleKind::RandomForestClassifier | EnsembleKind::ExtraTreesClassifier
        )
    }

    fn bootstrap(&self) -> bool {
        !matches!(
            self,
            EnsembleKind::ExtraTreesClassifier | EnsembleKind::ExtraTreesRegressor
        )
    }

    fn base_tree(&self) -> DecisionTree {
        match self {
            EnsembleKind::RandomForestClassifier => {
                DecisionTree::classifier().with_max_features(MaxFeatures::Sqrt)
            }
            EnsembleKind::RandomForestRegressor | EnsembleKind::BaggingRegressor => DecisionTree::regressor(),
            EnsembleKind::ExtraTreesClassifier => DecisionTree::extra_tree(true),
            EnsembleKind::ExtraTreesRegressor => DecisionTree::extra_tree(false),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            EnsembleKind::RandomForestClassifier => "RandomForestClassifier",
            EnsembleKind::RandomForestRegressor => "RandomForestRegressor",
            EnsembleKind::ExtraTreesClassifier => "ExtraTreesClassifier",
            EnsembleKind::ExtraTreesRegressor => "ExtraTreesRegressor",
            EnsembleKind::BaggingRegressor => "BaggingRegressor",
        }
    }
}

/// Ensemble of independently grown trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    kind: EnsembleKind,
    pub n_estimators: usize,
    pub random_state: Option<u64>,
    trees: Vec<DecisionTree>,
    classes: Vec<f64>,
}

impl TreeEnsemble {
    pub fn new(kind: EnsembleKind, n_estimators: usize) -> Self {
        Self {
            kind,
            n_estimators: n_estimators.max(1),
            random_state: None,
            trees: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn kind(&self) -> EnsembleKind {
        self.kind
    }
}

impl Estimator for TreeEnsemble {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        if self.kind.is_classification() {
            self.classes = class_labels(y);
        }

        let base_seed = self
            .random_state
            .unwrap_or_else(|| ChaCha8Rng::from_entropy().gen());
        let kind = self.kind;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let mut tree = kind.base_tree().with_random_state(seed);

                if kind.bootstrap() {
                    let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    tree.fit(&take_rows(x, &rows), &take_values(y, &rows))?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        let all_predictions = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<Array1<f64>>>>()?;

        if self.kind.is_classification() {
            Ok(majority_vote(&all_predictions, &self.classes, x.nrows()))
        } else {
            let mut sum = Array1::<f64>::zeros(x.nrows());
            for p in &all_predictions {
                sum += p;
            }
            Ok(sum / all_predictions.len() as f64)
        }
    }
}

/// Per-row most voted label; ties go to the lowest label
pub(crate) fn majority_vote(predictions: &[Array1<f64>], classes: &[f64], n_rows: usize) -> Array1<f64> {
    Array1::from_shape_fn(n_rows, |i| {
        let mut votes = vec![0usize; classes.len().max(1)];
        for p in predictions {
            votes[class_index(classes, p[i])] += 1;
        }
        let mut best = 0;
        for (k, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = k;
            }
        }
        classes.get(best).copied().unwrap_or(0.0)
    })
}
