//! Time-boxed candidate evaluation
//!
//! Candidates run one at a time in the order given by the
//! [`OrderPredictor`]. A wall-clock [`Deadline`] is armed on entry to
//! `Running` when a time limit is configured. The first candidate always
//! runs to completion; later candidates are abandoned once the deadline
//! passes, and a candidate that finishes after it is discarded. Whatever
//! the loop outcome, scores are normalized and ranked before returning.

use super::catalog::{CandidateSpec, Catalog};
use super::order::{descending, OrderPredictor};
use super::scoring::{RelativeLandmarkScorer, ScoreNormalizer};
use crate::config::{ProblemClass, SelectorConfig};
use crate::error::{Result, SelectionError};
use crate::meta_features::MetaFeatures;
use crate::training::{cross_val_score, CVStrategy, CrossValidator, Estimator, Scorer};
use crate::utils::Deadline;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one evaluation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvaluatorState {
    Idle,
    Running,
    /// Every ordered candidate was attempted
    Completed,
    /// The deadline stopped the loop early
    TimedOut,
    Finalizing,
    Done,
}

/// Raw outcome of one candidate
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub candidate: CandidateSpec,
    /// Mean cross-validated score (accuracy or negative MSE)
    pub score: f64,
    pub seconds: f64,
}

/// An evaluated candidate with its derived rank
#[derive(Debug, Clone, Serialize)]
pub struct RelativeLandmark {
    pub candidate: CandidateSpec,
    pub normalized_score: f64,
    pub seconds: f64,
    pub rank: f64,
}

/// Runs and ranks the catalog candidates of one problem class
#[derive(Debug)]
pub struct ModelEvaluator {
    problem: ProblemClass,
    catalog: Catalog,
    order: OrderPredictor,
    cv_folds: usize,
    time_limit: Option<Duration>,
    scorer: RelativeLandmarkScorer,
    random_state: Option<u64>,
    state: EvaluatorState,
    outcome: Option<EvaluatorState>,
    records: Vec<EvaluationRecord>,
    relative_landmarks: Vec<RelativeLandmark>,
}

impl ModelEvaluator {
    /// Evaluator over the built-in catalog. Meta-models are loaded here
    /// when a time limit is set.
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Catalog::for_problem(config.problem_class);
        let order = OrderPredictor::from_config(config, &catalog)?;
        Self::with_parts(config, catalog, order)
    }

    /// Evaluator over an explicit catalog and ordering
    pub fn with_parts(config: &SelectorConfig, catalog: Catalog, order: OrderPredictor) -> Result<Self> {
        config.validate()?;
        if catalog.problem_class() != config.problem_class {
            return Err(SelectionError::ConfigError(format!(
                "{} catalog given to a {} evaluator",
                catalog.problem_class(),
                config.problem_class
            )));
        }
        Ok(Self {
            problem: config.problem_class,
            catalog,
            order,
            cv_folds: config.cv_folds,
            time_limit: config.time_limit()?,
            scorer: RelativeLandmarkScorer::new(config.trade_rate),
            random_state: config.random_state,
            state: EvaluatorState::Idle,
            outcome: None,
            records: Vec::new(),
            relative_landmarks: Vec::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    /// `Completed` or `TimedOut` for the last run
    pub fn outcome(&self) -> Option<EvaluatorState> {
        self.outcome
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// Evaluated candidates with their ranks, in evaluation order
    pub fn relative_landmarks(&self) -> &[RelativeLandmark] {
        &self.relative_landmarks
    }

    /// Evaluate candidates on `(x, y)`, replacing the previous run's tables.
    ///
    /// Errors other than deadline expiry are returned after finalization.
    pub fn evaluate_models(&mut self, x: &Array2<f64>, y: &Array1<f64>, meta: &MetaFeatures) -> Result<()> {
        // A failed ordering leaves the previous run untouched
        let ordered = self.order.predict_order(&self.catalog, meta)?;
        self.records.clear();
        self.relative_landmarks.clear();
        self.outcome = None;

        self.state = EvaluatorState::Running;
        let mut deadline = Deadline::arm(self.time_limit);
        info!(
            problem = %self.problem,
            n_candidates = ordered.len(),
            time_limit_secs = self.time_limit.map(|d| d.as_secs_f64()),
            "Candidate evaluation started"
        );

        let result = self.run_candidates(&ordered, x, y, &deadline);
        // An aborted loop has no outcome and goes straight to finalization
        self.outcome = result.as_ref().ok().copied();
        if let Some(state) = self.outcome {
            self.state = state;
        }

        self.state = EvaluatorState::Finalizing;
        deadline.disarm();
        self.finalize();
        self.state = EvaluatorState::Done;

        result.map(|_| ())
    }

    fn run_candidates(
        &mut self,
        ordered: &[CandidateSpec],
        x: &Array2<f64>,
        y: &Array1<f64>,
        deadline: &Deadline,
    ) -> Result<EvaluatorState> {
        let splits = CrossValidator::new(CVStrategy::for_problem(self.problem, self.cv_folds)).split(y)?;
        let scorer = Scorer::for_candidates(self.problem);

        for (i, spec) in ordered.iter().enumerate() {
            // The first candidate is never interrupted
            let bound = if i == 0 { None } else { Some(deadline) };
            if bound.map_or(false, Deadline::is_expired) {
                info!(evaluated = self.records.len(), "Deadline expired before next candidate");
                return Ok(EvaluatorState::TimedOut);
            }

            debug!(candidate = spec.id(), "Evaluating candidate");
            let seed = self.random_state;
            let make = || spec.instantiate(seed);
            let start = Instant::now();
            let result = cross_val_score(&make, x, y, &splits, scorer, bound);
            let seconds = start.elapsed().as_secs_f64();

            match result {
                Ok(_) if bound.map_or(false, Deadline::is_expired) => {
                    info!(candidate = spec.id(), elapsed_secs = seconds, "Deadline expired, result discarded");
                    return Ok(EvaluatorState::TimedOut);
                }
                Ok(cv) if cv.mean_score.is_finite() => {
                    info!(candidate = spec.id(), score = cv.mean_score, elapsed_secs = seconds, "Candidate evaluated");
                    self.records.push(EvaluationRecord {
                        candidate: spec.clone(),
                        score: cv.mean_score,
                        seconds,
                    });
                }
                Ok(cv) => {
                    warn!(candidate = spec.id(), score = cv.mean_score, "Non-finite score, candidate skipped");
                }
                Err(e) if e.is_time_limit() => {
                    info!(candidate = spec.id(), elapsed_secs = seconds, "Deadline expired during cross-validation");
                    return Ok(EvaluatorState::TimedOut);
                }
                Err(e) => {
                    warn!(candidate = spec.id(), error = %e, "Candidate failed, skipped");
                }
            }
        }
        Ok(EvaluatorState::Completed)
    }

    fn finalize(&mut self) {
        let raw: Vec<f64> = self.records.iter().map(|r| r.score).collect();
        let seconds: Vec<f64> = self.records.iter().map(|r| r.seconds).collect();
        let normalized = ScoreNormalizer::new(self.problem).normalize(&raw);
        let ranks = self.scorer.rank(&normalized, &seconds);

        self.relative_landmarks = self
            .records
            .iter()
            .zip(normalized.into_iter().zip(ranks))
            .map(|(record, (normalized_score, rank))| RelativeLandmark {
                candidate: record.candidate.clone(),
                normalized_score,
                seconds: record.seconds,
                rank,
            })
            .collect();
        info!(
            evaluated = self.records.len(),
            outcome = ?self.outcome,
            "Evaluation finalized"
        );
    }

    /// Highest-ranked evaluated candidate; ties go to catalog order and NaN
    /// ranks lose to every finite one
    pub fn best_candidate(&self) -> Result<&CandidateSpec> {
        self.relative_landmarks
            .iter()
            .min_by(|a, b| match descending(a.rank, b.rank) {
                Ordering::Equal => a.candidate.position.cmp(&b.candidate.position),
                other => other,
            })
            .map(|rl| &rl.candidate)
            .ok_or(SelectionError::NoEvaluatedCandidates)
    }

    /// Untrained instance of the best candidate
    pub fn get_best_model(&self) -> Result<Box<dyn Estimator>> {
        Ok(self.best_candidate()?.instantiate(self.random_state))
    }

    /// `(candidate id, rank)` pairs of the last run
    pub fn landmark_pairs(&self) -> Vec<(String, f64)> {
        self.relative_landmarks
            .iter()
            .map(|rl| (rl.candidate.id().to_string(), rl.rank))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{MetaModel, MetaModelStore, ModelKind};

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 2)) % 7) as f64);
        let y = x.column(0).mapv(|v| 3.0 * v) - &x.column(1);
        (x, y)
    }

    fn small_evaluator(kinds: Vec<ModelKind>) -> ModelEvaluator {
        let config = SelectorConfig::new(ProblemClass::Regression).with_random_state(0);
        let catalog = Catalog::from_kinds(ProblemClass::Regression, kinds);
        ModelEvaluator::with_parts(&config, catalog, OrderPredictor::unordered()).unwrap()
    }

    #[test]
    fn test_best_model_before_evaluation_fails() {
        let evaluator = small_evaluator(vec![ModelKind::LinearRegression]);
        assert_eq!(evaluator.state(), EvaluatorState::Idle);
        assert!(matches!(evaluator.get_best_model(), Err(SelectionError::NoEvaluatedCandidates)));
    }

    #[test]
    fn test_exact_model_wins() {
        let mut evaluator = small_evaluator(vec![
            ModelKind::DecisionTreeRegressor { max_depth: Some(1) },
            ModelKind::LinearRegression,
        ]);
        let (x, y) = regression_data();
        evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();

        assert_eq!(evaluator.state(), EvaluatorState::Done);
        assert_eq!(evaluator.outcome(), Some(EvaluatorState::Completed));
        assert_eq!(evaluator.records().len(), 2);
        assert_eq!(evaluator.relative_landmarks().len(), 2);
        assert_eq!(evaluator.best_candidate().unwrap().id(), "LinearRegression");
        assert_eq!(evaluator.get_best_model().unwrap().name(), "LinearRegression");
    }

    #[test]
    fn test_split_failure_still_finalizes() {
        let mut evaluator = small_evaluator(vec![ModelKind::LinearRegression]);
        let x = Array2::zeros((2, 1));
        let y = Array1::zeros(2);
        assert!(evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).is_err());
        assert_eq!(evaluator.state(), EvaluatorState::Done);
        assert!(evaluator.relative_landmarks().is_empty());
    }

    #[test]
    fn test_ties_go_to_catalog_order() {
        let mut evaluator = small_evaluator(vec![ModelKind::LinearRegression, ModelKind::KernelRidge { alpha: 1.0 }]);
        let record = |kind: ModelKind, position: usize| RelativeLandmark {
            candidate: CandidateSpec { position, kind },
            normalized_score: 0.5,
            seconds: 1.0,
            rank: 0.5,
        };
        evaluator.relative_landmarks = vec![
            record(ModelKind::KernelRidge { alpha: 1.0 }, 1),
            record(ModelKind::LinearRegression, 0),
        ];
        assert_eq!(evaluator.best_candidate().unwrap().id(), "LinearRegression");

        evaluator.relative_landmarks[1].rank = f64::NAN;
        assert_eq!(evaluator.best_candidate().unwrap().id(), "KernelRidge");
    }

    #[test]
    fn test_faster_slightly_worse_candidate_is_best() {
        let config = SelectorConfig::new(ProblemClass::Classification).with_trade_rate(0.05);
        let fast = ModelKind::GaussianNB { var_smoothing: 1e-9 };
        let slow = ModelKind::SVC { c: 1.0 };
        let catalog = Catalog::from_kinds(ProblemClass::Classification, vec![slow.clone(), fast.clone()]);
        let mut evaluator = ModelEvaluator::with_parts(&config, catalog, OrderPredictor::unordered()).unwrap();

        // 0.91 in 10s against 0.90 in 1s
        evaluator.records = vec![
            EvaluationRecord {
                candidate: CandidateSpec { position: 0, kind: slow },
                score: 0.91,
                seconds: 10.0,
            },
            EvaluationRecord {
                candidate: CandidateSpec { position: 1, kind: fast },
                score: 0.90,
                seconds: 1.0,
            },
        ];
        evaluator.finalize();

        assert_eq!(evaluator.best_candidate().unwrap().id(), "GaussianNB");
        assert_eq!(evaluator.get_best_model().unwrap().name(), "GaussianNB");
    }

    #[test]
    fn test_failed_ordering_keeps_previous_run() {
        let mut evaluator = small_evaluator(vec![
            ModelKind::LinearRegression,
            ModelKind::KNeighborsRegressor { n_neighbors: 3 },
        ]);
        let (x, y) = regression_data();
        evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();

        // No meta-model for the second candidate
        let store = MetaModelStore::from_models([MetaModel::constant("LinearRegression", 1.0)]);
        evaluator.order = OrderPredictor::with_store(store);
        let err = evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap_err();

        assert!(matches!(err, SelectionError::MissingMetaModel { .. }));
        assert_eq!(evaluator.state(), EvaluatorState::Done);
        assert_eq!(evaluator.outcome(), Some(EvaluatorState::Completed));
        assert_eq!(evaluator.records().len(), 2);
        assert_eq!(evaluator.relative_landmarks().len(), 2);
    }
}
