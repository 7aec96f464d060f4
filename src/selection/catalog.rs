//! Candidate catalog: the fixed, per-problem-class list of model kinds that
//! the evaluator may try

use crate::config::ProblemClass;
use crate::training::boosting::{
    AdaBoostClassifier, AdaBoostRegressor, GradientBoostingClassifier, GradientBoostingConfig,
    GradientBoostingRegressor,
};
use crate::training::calibration::CalibratedClassifierCV;
use crate::training::decision_tree::DecisionTree;
use crate::training::ensemble::{EnsembleKind, TreeEnsemble};
use crate::training::knn::{KNeighborsClassifier, KNeighborsRegressor, NearestCentroid};
use crate::training::linear_models::{BayesianRidge, HuberRegressor, KernelRidge, LinearRegression};
use crate::training::logistic::{LogisticRegression, LogisticRegressionCV};
use crate::training::naive_bayes::{BernoulliNB, GaussianNB, MultinomialNB};
use crate::training::neural_network::{MLPClassifier, MLPConfig};
use crate::training::online::{OnlineClassifier, PassiveAggressiveRegressor};
use crate::training::projection::{OrthogonalMatchingPursuit, OrthogonalMatchingPursuitCV, PLSRegression};
use crate::training::svm::{LinearSVC, SupportVectorRegressor, SVC};
use crate::training::Estimator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every candidate model kind with its hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum ModelKind {
    // Classification
    AdaBoostClassifier { n_estimators: usize, learning_rate: f64 },
    BernoulliNB { alpha: f64, binarize: f64 },
    CalibratedClassifierCV { cv_folds: usize },
    DecisionTreeClassifier { max_depth: Option<usize> },
    ExtraTreeClassifier { max_depth: Option<usize> },
    ExtraTreesClassifier { n_estimators: usize },
    GaussianNB { var_smoothing: f64 },
    GradientBoostingClassifier { n_estimators: usize, learning_rate: f64, max_depth: usize },
    KNeighborsClassifier { n_neighbors: usize },
    LinearSVC { c: f64 },
    LogisticRegression { c: f64 },
    LogisticRegressionCV { n_cs: usize, cv_folds: usize },
    MLPClassifier { hidden_layers: Vec<usize>, max_iter: usize },
    MultinomialNB { alpha: f64 },
    NearestCentroid,
    PassiveAggressiveClassifier { c: f64, tol: f64 },
    Perceptron { tol: f64 },
    RandomForestClassifier { n_estimators: usize },
    SVC { c: f64 },

    // Regression
    AdaBoostRegressor { n_estimators: usize, learning_rate: f64 },
    BaggingRegressor { n_estimators: usize },
    BayesianRidge { max_iter: usize },
    DecisionTreeRegressor { max_depth: Option<usize> },
    ExtraTreeRegressor { max_depth: Option<usize> },
    ExtraTreesRegressor { n_estimators: usize },
    GradientBoostingRegressor { n_estimators: usize, learning_rate: f64, max_depth: usize },
    HuberRegressor { epsilon: f64, alpha: f64 },
    KNeighborsRegressor { n_neighbors: usize },
    KernelRidge { alpha: f64 },
    LinearRegression,
    LinearSVR { c: f64 },
    NuSVR { c: f64 },
    OrthogonalMatchingPursuit { n_nonzero_coefs: Option<usize> },
    OrthogonalMatchingPursuitCV { cv_folds: usize },
    PLSRegression { n_components: usize },
    PassiveAggressiveRegressor { c: f64, tol: f64 },
    RandomForestRegressor { n_estimators: usize },
    SVR { c: f64 },
}

impl ModelKind {
    /// Identifier used in meta-model file names and run-log columns
    pub fn id(&self) -> &'static str {
        match self {
            ModelKind::AdaBoostClassifier { .. } => "AdaBoostClassifier",
            ModelKind::BernoulliNB { .. } => "BernoulliNB",
            ModelKind::CalibratedClassifierCV { .. } => "CalibratedClassifierCV",
            ModelKind::DecisionTreeClassifier { .. } => "DecisionTreeClassifier",
            ModelKind::ExtraTreeClassifier { .. } => "ExtraTreeClassifier",
            ModelKind::ExtraTreesClassifier { .. } => "ExtraTreesClassifier",
            ModelKind::GaussianNB { .. } => "GaussianNB",
            ModelKind::GradientBoostingClassifier { .. } => "GradientBoostingClassifier",
            ModelKind::KNeighborsClassifier { .. } => "KNeighborsClassifier",
            ModelKind::LinearSVC { .. } => "LinearSVC",
            ModelKind::LogisticRegression { .. } => "LogisticRegression",
            ModelKind::LogisticRegressionCV { .. } => "LogisticRegressionCV",
            ModelKind::MLPClassifier { .. } => "MLPClassifier",
            ModelKind::MultinomialNB { .. } => "MultinomialNB",
            ModelKind::NearestCentroid => "NearestCentroid",
            ModelKind::PassiveAggressiveClassifier { .. } => "PassiveAggressiveClassifier",
            ModelKind::Perceptron { .. } => "Perceptron",
            ModelKind::RandomForestClassifier { .. } => "RandomForestClassifier",
            ModelKind::SVC { .. } => "SVC",
            ModelKind::AdaBoostRegressor { .. } => "AdaBoostRegressor",
            ModelKind::BaggingRegressor { .. } => "BaggingRegressor",
            ModelKind::BayesianRidge { .. } => "BayesianRidge",
            ModelKind::DecisionTreeRegressor { .. } => "DecisionTreeRegressor",
            ModelKind::ExtraTreeRegressor { .. } => "ExtraTreeRegressor",
            ModelKind::ExtraTreesRegressor { .. } => "ExtraTreesRegressor",
            ModelKind::GradientBoostingRegressor { .. } => "GradientBoostingRegressor",
            ModelKind::HuberRegressor { .. } => "HuberRegressor",
            ModelKind::KNeighborsRegressor { .. } => "KNeighborsRegressor",
            ModelKind::KernelRidge { .. } => "KernelRidge",
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::LinearSVR { .. } => "LinearSVR",
            ModelKind::NuSVR { .. } => "NuSVR",
            ModelKind::OrthogonalMatchingPursuit { .. } => "OrthogonalMatchingPursuit",
            ModelKind::OrthogonalMatchingPursuitCV { .. } => "OrthogonalMatchingPursuitCV",
            ModelKind::PLSRegression { .. } => "PLSRegression",
            ModelKind::PassiveAggressiveRegressor { .. } => "PassiveAggressiveRegressor",
            ModelKind::RandomForestRegressor { .. } => "RandomForestRegressor",
            ModelKind::SVR { .. } => "SVR",
        }
    }

    /// Default classification catalog, in evaluation order
    pub fn classification_defaults() -> Vec<ModelKind> {
        vec![
            ModelKind::AdaBoostClassifier { n_estimators: 50, learning_rate: 1.0 },
            ModelKind::BernoulliNB { alpha: 1.0, binarize: 0.0 },
            ModelKind::CalibratedClassifierCV { cv_folds: 5 },
            ModelKind::DecisionTreeClassifier { max_depth: None },
            ModelKind::ExtraTreeClassifier { max_depth: None },
            ModelKind::ExtraTreesClassifier { n_estimators: 100 },
            ModelKind::GaussianNB { var_smoothing: 1e-9 },
            ModelKind::GradientBoostingClassifier { n_estimators: 100, learning_rate: 0.1, max_depth: 3 },
            ModelKind::KNeighborsClassifier { n_neighbors: 5 },
            ModelKind::LinearSVC { c: 1.0 },
            ModelKind::LogisticRegression { c: 1.0 },
            ModelKind::LogisticRegressionCV { n_cs: 10, cv_folds: 5 },
            ModelKind::MLPClassifier { hidden_layers: vec![100], max_iter: 200 },
            ModelKind::MultinomialNB { alpha: 1.0 },
            ModelKind::NearestCentroid,
            ModelKind::PassiveAggressiveClassifier { c: 1.0, tol: 1e-3 },
            ModelKind::Perceptron { tol: 1e-3 },
            ModelKind::RandomForestClassifier { n_estimators: 100 },
            ModelKind::SVC { c: 1.0 },
        ]
    }

    /// Default regression catalog, in evaluation order
    pub fn regression_defaults() -> Vec<ModelKind> {
        vec![
            ModelKind::AdaBoostRegressor { n_estimators: 50, learning_rate: 1.0 },
            ModelKind::BaggingRegressor { n_estimators: 10 },
            ModelKind::BayesianRidge { max_iter: 300 },
            ModelKind::DecisionTreeRegressor { max_depth: None },
            ModelKind::ExtraTreeRegressor { max_depth: None },
            ModelKind::ExtraTreesRegressor { n_estimators: 100 },
            ModelKind::GradientBoostingRegressor { n_estimators: 100, learning_rate: 0.1, max_depth: 3 },
            ModelKind::HuberRegressor { epsilon: 1.35, alpha: 1e-4 },
            ModelKind::KNeighborsRegressor { n_neighbors: 5 },
            ModelKind::KernelRidge { alpha: 1.0 },
            ModelKind::LinearRegression,
            ModelKind::LinearSVR { c: 1.0 },
            ModelKind::NuSVR { c: 1.0 },
            ModelKind::OrthogonalMatchingPursuit { n_nonzero_coefs: None },
            ModelKind::OrthogonalMatchingPursuitCV { cv_folds: 5 },
            ModelKind::PLSRegression { n_components: 2 },
            ModelKind::PassiveAggressiveRegressor { c: 1.0, tol: 1e-3 },
            ModelKind::RandomForestRegressor { n_estimators: 100 },
            ModelKind::SVR { c: 1.0 },
        ]
    }

    /// Build an unfitted estimator; `seed` fixes every source of randomness
    pub fn instantiate(&self, seed: Option<u64>) -> Box<dyn Estimator> {
        match self {
            ModelKind::AdaBoostClassifier { n_estimators, learning_rate } => {
                let mut model = AdaBoostClassifier::new(*n_estimators, *learning_rate);
                model.random_state = seed;
                Box::new(model)
            }
            ModelKind::BernoulliNB { alpha, binarize } => {
                let mut model = BernoulliNB::default();
                model.alpha = *alpha;
                model.binarize = *binarize;
                Box::new(model)
            }
            ModelKind::CalibratedClassifierCV { cv_folds } => {
                let mut model = CalibratedClassifierCV::default();
                model.cv_folds = *cv_folds;
                model.random_state = seed;
                Box::new(model)
            }
            ModelKind::DecisionTreeClassifier { max_depth } => {
                Box::new(seeded_tree(DecisionTree::classifier(), *max_depth, seed))
            }
            ModelKind::ExtraTreeClassifier { max_depth } => {
                Box::new(seeded_tree(DecisionTree::extra_tree(true), *max_depth, seed))
            }
            ModelKind::ExtraTreesClassifier { n_estimators } => {
                seeded_ensemble(EnsembleKind::ExtraTreesClassifier, *n_estimators, seed)
            }
            ModelKind::GaussianNB { var_smoothing } => {
                Box::new(GaussianNB::default().with_var_smoothing(*var_smoothing))
            }
            ModelKind::GradientBoostingClassifier { n_estimators, learning_rate, max_depth } => {
                Box::new(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: *n_estimators,
                    learning_rate: *learning_rate,
                    max_depth: *max_depth,
                }))
            }
            ModelKind::KNeighborsClassifier { n_neighbors } => Box::new(KNeighborsClassifier::new(*n_neighbors)),
            ModelKind::LinearSVC { c } => {
                let mut model = LinearSVC::default();
                model.c = *c;
                model.random_state = seed;
                Box::new(model)
            }
            ModelKind::LogisticRegression { c } => Box::new(LogisticRegression::new(*c)),
            ModelKind::LogisticRegressionCV { n_cs, cv_folds } => {
                let mut model = LogisticRegressionCV::default();
                model.cs = log_grid(*n_cs);
                model.cv_folds = *cv_folds;
                Box::new(model)
            }
            ModelKind::MLPClassifier { hidden_layers, max_iter } => {
                let config = MLPConfig {
                    hidden_layers: hidden_layers.clone(),
                    max_iter: *max_iter,
                    random_state: seed,
                    ..MLPConfig::default()
                };
                Box::new(MLPClassifier::new(config))
            }
            ModelKind::MultinomialNB { alpha } => {
                let mut model = MultinomialNB::default();
                model.alpha = *alpha;
                Box::new(model)
            }
            ModelKind::NearestCentroid => Box::new(NearestCentroid::default()),
            ModelKind::PassiveAggressiveClassifier { c, tol } => {
                let mut model = OnlineClassifier::passive_aggressive(*c);
                model.schedule.tol = *tol;
                model.schedule.random_state = seed;
                Box::new(model)
            }
            ModelKind::Perceptron { tol } => {
                let mut model = OnlineClassifier::perceptron();
                model.schedule.tol = *tol;
                model.schedule.random_state = seed;
                Box::new(model)
            }
            ModelKind::RandomForestClassifier { n_estimators } => {
                seeded_ensemble(EnsembleKind::RandomForestClassifier, *n_estimators, seed)
            }
            ModelKind::SVC { c } => {
                let mut model = SVC::default();
                model.c = *c;
                model.random_state = seed;
                Box::new(model)
            }
            ModelKind::AdaBoostRegressor { n_estimators, learning_rate } => {
                let mut model = AdaBoostRegressor::new(*n_estimators, *learning_rate);
                model.random_state = seed;
                Box::new(model)
            }
            ModelKind::BaggingRegressor { n_estimators } => {
                seeded_ensemble(EnsembleKind::BaggingRegressor, *n_estimators, seed)
            }
            ModelKind::BayesianRidge { max_iter } => {
                let mut model = BayesianRidge::default();
                model.max_iter = *max_iter;
                Box::new(model)
            }
            ModelKind::DecisionTreeRegressor { max_depth } => {
                Box::new(seeded_tree(DecisionTree::regressor(), *max_depth, seed))
            }
            ModelKind::ExtraTreeRegressor { max_depth } => {
                Box::new(seeded_tree(DecisionTree::extra_tree(false), *max_depth, seed))
            }
            ModelKind::ExtraTreesRegressor { n_estimators } => {
                seeded_ensemble(EnsembleKind::ExtraTreesRegressor, *n_estimators, seed)
            }
            ModelKind::GradientBoostingRegressor { n_estimators, learning_rate, max_depth } => {
                Box::new(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: *n_estimators,
                    learning_rate: *learning_rate,
                    max_depth: *max_depth,
                }))
            }
            ModelKind::HuberRegressor { epsilon, alpha } => {
                let mut model = HuberRegressor::default();
                model.epsilon = *epsilon;
                model.alpha = *alpha;
                Box::new(model)
            }
            ModelKind::KNeighborsRegressor { n_neighbors } => Box::new(KNeighborsRegressor::new(*n_neighbors)),
            ModelKind::KernelRidge { alpha } => {
                let mut model = KernelRidge::default();
                model.alpha = *alpha;
                Box::new(model)
            }
            ModelKind::LinearRegression => Box::new(LinearRegression::new()),
            ModelKind::LinearSVR { c } => {
                let mut model = SupportVectorRegressor::linear_svr();
                model.c = *c;
                Box::new(model)
            }
            ModelKind::NuSVR { c } => {
                let mut model = SupportVectorRegressor::nu_svr();
                model.c = *c;
                Box::new(model)
            }
            ModelKind::OrthogonalMatchingPursuit { n_nonzero_coefs } => {
                let mut model = OrthogonalMatchingPursuit::default();
                model.n_nonzero_coefs = *n_nonzero_coefs;
                Box::new(model)
            }
            ModelKind::OrthogonalMatchingPursuitCV { cv_folds } => {
                let mut model = OrthogonalMatchingPursuitCV::default();
                model.cv_folds = *cv_folds;
                Box::new(model)
            }
            ModelKind::PLSRegression { n_components } => {
                let mut model = PLSRegression::default();
                model.n_components = *n_components;
                Box::new(model)
            }
            ModelKind::PassiveAggressiveRegressor { c, tol } => {
                let mut model = PassiveAggressiveRegressor::default();
                model.c = *c;
                model.schedule.tol = *tol;
                model.schedule.random_state = seed;
                Box::new(model)
            }
            ModelKind::RandomForestRegressor { n_estimators } => {
                seeded_ensemble(EnsembleKind::RandomForestRegressor, *n_estimators, seed)
            }
            ModelKind::SVR { c } => {
                let mut model = SupportVectorRegressor::svr();
                model.c = *c;
                Box::new(model)
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

fn seeded_tree(tree: DecisionTree, max_depth: Option<usize>, seed: Option<u64>) -> DecisionTree {
    let tree = match max_depth {
        Some(depth) => tree.with_max_depth(depth),
        None => tree,
    };
    match seed {
        Some(s) => tree.with_random_state(s),
        None => tree,
    }
}

fn seeded_ensemble(kind: EnsembleKind, n_estimators: usize, seed: Option<u64>) -> Box<dyn Estimator> {
    let ensemble = TreeEnsemble::new(kind, n_estimators);
    Box::new(match seed {
        Some(s) => ensemble.with_random_state(s),
        None => ensemble,
    })
}

/// `n` log-spaced values from 1e-4 to 1e4
fn log_grid(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| 10f64.powf(-4.0 + 8.0 * i as f64 / (n - 1) as f64))
            .collect(),
    }
}

/// A catalog entry: a model kind and its position in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub position: usize,
    pub kind: ModelKind,
}

impl CandidateSpec {
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn instantiate(&self, seed: Option<u64>) -> Box<dyn Estimator> {
        self.kind.instantiate(seed)
    }
}

/// Ordered, duplicate-free list of candidates for one problem class
#[derive(Debug, Clone)]
pub struct Catalog {
    problem: ProblemClass,
    entries: Vec<CandidateSpec>,
}

impl Catalog {
    /// The built-in catalog for `problem`
    pub fn for_problem(problem: ProblemClass) -> Self {
        let kinds = match problem {
            ProblemClass::Classification => ModelKind::classification_defaults(),
            ProblemClass::Regression => ModelKind::regression_defaults(),
        };
        Self::from_kinds(problem, kinds)
    }

    /// A catalog over `kinds`; later duplicates of an id are dropped
    pub fn from_kinds(problem: ProblemClass, kinds: Vec<ModelKind>) -> Self {
        let mut entries: Vec<CandidateSpec> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if entries.iter().all(|e| e.id() != kind.id()) {
                entries.push(CandidateSpec {
                    position: entries.len(),
                    kind,
                });
            }
        }
        Self { problem, entries }
    }

    pub fn problem_class(&self) -> ProblemClass {
        self.problem
    }

    pub fn get(&self, id: &str) -> Option<&CandidateSpec> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateSpec> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(CandidateSpec::id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CandidateSpec] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_sizes_and_order() {
        let classification = Catalog::for_problem(ProblemClass::Classification);
        assert_eq!(classification.len(), 19);
        assert_eq!(classification.ids()[0], "AdaBoostClassifier");
        assert_eq!(classification.ids()[18], "SVC");

        let regression = Catalog::for_problem(ProblemClass::Regression);
        assert_eq!(regression.len(), 19);
        assert_eq!(regression.ids()[10], "LinearRegression");
        assert_eq!(regression.get("NuSVR").map(|c| c.position), Some(12));
    }

    #[test]
    fn test_instantiated_names_match_ids() {
        for problem in [ProblemClass::Classification, ProblemClass::Regression] {
            for spec in Catalog::for_problem(problem).iter() {
                assert_eq!(spec.instantiate(Some(0)).name(), spec.id());
            }
        }
    }

    #[test]
    fn test_duplicates_dropped() {
        let catalog = Catalog::from_kinds(
            ProblemClass::Regression,
            vec![
                ModelKind::LinearRegression,
                ModelKind::KernelRidge { alpha: 1.0 },
                ModelKind::LinearRegression,
            ],
        );
        assert_eq!(catalog.ids(), vec!["LinearRegression", "KernelRidge"]);
        assert_eq!(catalog.entries()[1].position, 1);
    }

    #[test]
    fn test_log_grid_bounds() {
        let grid = log_grid(10);
        assert!((grid[0] - 1e-4).abs() < 1e-12);
        assert!((grid[9] - 1e4).abs() < 1e-6);
    }
}
