//! Landmark baselines: cheap models whose cross-validated score describes
//! how hard a dataset is

use crate::config::ProblemClass;
use crate::training::decision_tree::DecisionTree;
use crate::training::discriminant::LinearDiscriminantAnalysis;
use crate::training::knn::{KNeighborsClassifier, KNeighborsRegressor};
use crate::training::linear_models::LinearRegression;
use crate::training::{cross_val_score, take_rows, take_values, CVStrategy, CrossValidator, Estimator, Scorer};
use crate::error::Result;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::{debug, warn};

/// Number of landmark baselines per problem class
pub const LANDMARK_COUNT: usize = 4;

/// A landmark baseline, in schema position order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    /// Decision tree limited to depth 2
    ShallowTree,
    /// 1-nearest neighbour
    OneNeighbor,
    /// 3-nearest neighbours
    ThreeNeighbors,
    /// LDA for classification, least squares for regression
    Linear,
}

impl Landmark {
    pub const ALL: [Landmark; LANDMARK_COUNT] = [
        Landmark::ShallowTree,
        Landmark::OneNeighbor,
        Landmark::ThreeNeighbors,
        Landmark::Linear,
    ];

    pub fn instantiate(&self, problem: ProblemClass, seed: Option<u64>) -> Box<dyn Estimator> {
        match (self, problem) {
            (Landmark::ShallowTree, ProblemClass::Classification) => {
                let tree = DecisionTree::classifier().with_max_depth(2);
                Box::new(match seed {
                    Some(s) => tree.with_random_state(s),
                    None => tree,
                })
            }
            (Landmark::ShallowTree, ProblemClass::Regression) => {
                let tree = DecisionTree::regressor().with_max_depth(2);
                Box::new(match seed {
                    Some(s) => tree.with_random_state(s),
                    None => tree,
                })
            }
            (Landmark::OneNeighbor, ProblemClass::Classification) => Box::new(KNeighborsClassifier::new(1)),
            (Landmark::OneNeighbor, ProblemClass::Regression) => Box::new(KNeighborsRegressor::new(1)),
            (Landmark::ThreeNeighbors, ProblemClass::Classification) => Box::new(KNeighborsClassifier::new(3)),
            (Landmark::ThreeNeighbors, ProblemClass::Regression) => Box::new(KNeighborsRegressor::new(3)),
            (Landmark::Linear, ProblemClass::Classification) => Box::new(LinearDiscriminantAnalysis::default()),
            (Landmark::Linear, ProblemClass::Regression) => Box::new(LinearRegression::new()),
        }
    }
}

/// Mean score and wall-clock seconds of one landmark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkResult {
    pub score: f64,
    pub seconds: f64,
}

impl LandmarkResult {
    fn failed() -> Self {
        Self {
            score: f64::NAN,
            seconds: f64::NAN,
        }
    }
}

/// Runs the landmark baselines on a bounded random sample
#[derive(Debug, Clone)]
pub struct LandmarkRunner {
    pub problem: ProblemClass,
    pub sample_size: usize,
    pub n_folds: usize,
    pub random_state: Option<u64>,
}

impl LandmarkRunner {
    pub fn new(problem: ProblemClass) -> Self {
        Self {
            problem,
            sample_size: 500,
            n_folds: 5,
            random_state: None,
        }
    }

    /// Shuffled sample of at most `sample_size` rows, drawn without replacement
    fn sample(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let n = y.len();
        let rows = rand::seq::index::sample(&mut rng, n, n.min(self.sample_size)).into_vec();
        (take_rows(x, &rows), take_values(y, &rows))
    }

    fn run_one(&self, landmark: Landmark, x: &Array2<f64>, y: &Array1<f64>) -> Result<LandmarkResult> {
        let start = Instant::now();
        let splits = CrossValidator::new(CVStrategy::for_problem(self.problem, self.n_folds)).split(y)?;
        let make = || landmark.instantiate(self.problem, self.random_state);
        let results = cross_val_score(&make, x, y, &splits, Scorer::for_landmarks(self.problem), None)?;
        Ok(LandmarkResult {
            score: results.mean_score,
            seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// One result per landmark in schema order; failures become NaN pairs
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>) -> Vec<LandmarkResult> {
        if y.is_empty() {
            return vec![LandmarkResult::failed(); LANDMARK_COUNT];
        }
        let (xs, ys) = self.sample(x, y);
        Landmark::ALL
            .iter()
            .enumerate()
            .map(|(i, &landmark)| match self.run_one(landmark, &xs, &ys) {
                Ok(result) => {
                    debug!(landmark = i, score = result.score, seconds = result.seconds, "Landmark evaluated");
                    result
                }
                Err(e) => {
                    warn!(landmark = i, error = %e, "Landmark failed");
                    LandmarkResult::failed()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmarks_on_separable_data() {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| (i % 2) as f64 * 5.0 + ((i + j) % 3) as f64 * 0.1);
        let y = Array1::from_shape_fn(60, |i| (i % 2) as f64);
        let mut runner = LandmarkRunner::new(ProblemClass::Classification);
        runner.random_state = Some(0);
        let results = runner.run(&x, &y);
        assert_eq!(results.len(), LANDMARK_COUNT);
        for result in &results {
            assert!((result.score - 1.0).abs() < 1e-12, "score {}", result.score);
            assert!(result.seconds >= 0.0);
        }
    }

    #[test]
    fn test_too_few_rows_yield_nan() {
        let x = Array2::from_shape_fn((3, 1), |(i, _)| i as f64);
        let y = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let results = LandmarkRunner::new(ProblemClass::Regression).run(&x, &y);
        assert!(results.iter().all(|r| r.score.is_nan() && r.seconds.is_nan()));
    }

    #[test]
    fn test_sample_is_bounded() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(50, |i| i as f64);
        let mut runner = LandmarkRunner::new(ProblemClass::Regression);
        runner.sample_size = 20;
        runner.random_state = Some(4);
        let (xs, ys) = runner.sample(&x, &y);
        assert_eq!(xs.nrows(), 20);
        assert_eq!(xs.column(0).to_owned(), ys);
    }
}
