//! Integration tests for the selection engine: catalog evaluation, time
//! budgets, meta-model ordering and ranking

use automl_selector::autopipeline::AutoSelect;
use automl_selector::config::{ProblemClass, SelectorConfig};
use automl_selector::error::SelectionError;
use automl_selector::meta_features::MetaFeatures;
use automl_selector::selection::meta_model::store_dir;
use automl_selector::selection::{
    Catalog, EvaluatorState, MetaModel, MetaModelStore, ModelEvaluator, ModelKind, OrderPredictor, RelativeLandmarkScorer,
    ScoreNormalizer,
};
use ndarray::{Array1, Array2};
use std::path::Path;

// ============================================================================
// Fixtures
// ============================================================================

/// Three well separated, non-negative classes of 15 rows each
fn three_blobs() -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((45, 3), |(i, j)| {
        let class = (i % 3) as f64;
        class * 3.0 + ((i * 7 + j * 3) % 10) as f64 * 0.1
    });
    let y = Array1::from_shape_fn(45, |i| (i % 3) as f64);
    (x, y)
}

fn write_constant_store(base: &Path, problem: ProblemClass, value_for: impl Fn(&str) -> f64) {
    let dir = store_dir(base, problem);
    std::fs::create_dir_all(&dir).unwrap();
    for spec in Catalog::for_problem(problem).iter() {
        MetaModel::constant(spec.id(), value_for(spec.id()))
            .save(&dir.join(format!("{}.json", spec.id())))
            .unwrap();
    }
}

// ============================================================================
// Unbounded evaluation
// ============================================================================

#[test]
fn test_zero_time_limit_evaluates_every_candidate() {
    let (x, y) = three_blobs();
    let config = SelectorConfig::new(ProblemClass::Classification).with_random_state(0);
    let mut evaluator = ModelEvaluator::new(&config).unwrap();

    // Arbitrary meta-features make no difference without a budget
    let mut meta = MetaFeatures::new();
    meta.insert("NExamples", f64::NAN);
    evaluator.evaluate_models(&x, &y, &meta).unwrap();

    let catalog = Catalog::for_problem(ProblemClass::Classification);
    assert_eq!(evaluator.outcome(), Some(EvaluatorState::Completed));
    assert_eq!(evaluator.records().len(), catalog.len());
    let evaluated: Vec<&str> = evaluator.records().iter().map(|r| r.candidate.id()).collect();
    assert_eq!(evaluated, catalog.ids());
    assert_eq!(evaluator.relative_landmarks().len(), evaluator.records().len());

    for record in evaluator.records() {
        assert!((0.0..=1.0).contains(&record.score), "{} scored {}", record.candidate.id(), record.score);
    }
    let best = evaluator.best_candidate().unwrap();
    assert!(evaluator.records().iter().any(|r| r.candidate.id() == best.id()));
}

#[test]
fn test_failing_candidate_is_skipped() {
    let x = Array2::from_shape_fn((30, 2), |(i, j)| if i % 2 == 0 { -1.0 - j as f64 } else { 1.0 + j as f64 });
    let y = Array1::from_shape_fn(30, |i| (i % 2) as f64);
    let config = SelectorConfig::new(ProblemClass::Classification);
    let catalog = Catalog::from_kinds(
        ProblemClass::Classification,
        vec![ModelKind::MultinomialNB { alpha: 1.0 }, ModelKind::GaussianNB { var_smoothing: 1e-9 }],
    );
    let mut evaluator = ModelEvaluator::with_parts(&config, catalog, OrderPredictor::unordered()).unwrap();
    evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();

    assert_eq!(evaluator.outcome(), Some(EvaluatorState::Completed));
    assert_eq!(evaluator.records().len(), 1);
    assert_eq!(evaluator.records()[0].candidate.id(), "GaussianNB");
    assert_eq!(evaluator.get_best_model().unwrap().name(), "GaussianNB");
}

#[test]
fn test_regression_scores_are_normalized() {
    let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 3)) % 11) as f64);
    let y = x.column(0).mapv(|v| 1.5 * v) + &x.column(1);
    // Ranking by score alone
    let config = SelectorConfig::new(ProblemClass::Regression)
        .with_trade_rate(0.0)
        .with_random_state(2);
    let catalog = Catalog::from_kinds(
        ProblemClass::Regression,
        vec![
            ModelKind::KNeighborsRegressor { n_neighbors: 5 },
            ModelKind::LinearRegression,
            ModelKind::DecisionTreeRegressor { max_depth: Some(1) },
        ],
    );
    let mut evaluator = ModelEvaluator::with_parts(&config, catalog, OrderPredictor::unordered()).unwrap();
    evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();

    let landmarks = evaluator.relative_landmarks();
    assert_eq!(landmarks.len(), 3);
    for rl in landmarks {
        assert!(rl.normalized_score > 0.0 && rl.normalized_score <= 1.0 + 1e-6);
    }
    let worst_rmse = evaluator
        .records()
        .iter()
        .map(|r| (-r.score).sqrt())
        .fold(0.0, f64::max);
    let worst = landmarks
        .iter()
        .zip(evaluator.records())
        .find(|(_, r)| (-r.score).sqrt() == worst_rmse)
        .map(|(rl, _)| rl.normalized_score)
        .unwrap();
    assert!((worst - 1e-6).abs() < 1e-12);
    assert_eq!(evaluator.best_candidate().unwrap().id(), "LinearRegression");
}

// ============================================================================
// Time budget and ordering
// ============================================================================

#[test]
fn test_tiny_budget_keeps_only_first_candidate() {
    let dir = tempfile::tempdir().unwrap();
    write_constant_store(dir.path(), ProblemClass::Classification, |id| {
        if id == "GaussianNB" {
            1.0
        } else {
            0.5
        }
    });

    let config = SelectorConfig::new(ProblemClass::Classification)
        .with_time_limit_secs(1e-9)
        .with_meta_model_dir(dir.path());
    let mut evaluator = ModelEvaluator::new(&config).unwrap();
    let (x, y) = three_blobs();
    evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();

    assert_eq!(evaluator.outcome(), Some(EvaluatorState::TimedOut));
    assert_eq!(evaluator.state(), EvaluatorState::Done);
    assert_eq!(evaluator.records().len(), 1);
    assert_eq!(evaluator.records()[0].candidate.id(), "GaussianNB");
    assert_eq!(evaluator.relative_landmarks().len(), 1);
    assert_eq!(evaluator.best_candidate().unwrap().id(), "GaussianNB");
}

#[test]
fn test_generous_budget_completes() {
    let dir = tempfile::tempdir().unwrap();
    write_constant_store(dir.path(), ProblemClass::Regression, |_| 0.5);

    let catalog = Catalog::from_kinds(
        ProblemClass::Regression,
        vec![ModelKind::LinearRegression, ModelKind::KNeighborsRegressor { n_neighbors: 3 }],
    );
    let config = SelectorConfig::new(ProblemClass::Regression)
        .with_time_limit_secs(3600.0)
        .with_meta_model_dir(dir.path());
    let order = OrderPredictor::from_config(&config, &catalog).unwrap();
    assert!(order.is_ordering());
    let mut evaluator = ModelEvaluator::with_parts(&config, catalog, order).unwrap();

    let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
    let y = x.column(0).to_owned();
    evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();
    assert_eq!(evaluator.outcome(), Some(EvaluatorState::Completed));
    assert_eq!(evaluator.records().len(), 2);
}

#[test]
fn test_missing_meta_model_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    write_constant_store(dir.path(), ProblemClass::Regression, |_| 0.5);
    std::fs::remove_file(store_dir(dir.path(), ProblemClass::Regression).join("SVR.json")).unwrap();

    let config = SelectorConfig::new(ProblemClass::Regression)
        .with_time_limit_secs(10.0)
        .with_meta_model_dir(dir.path());
    match ModelEvaluator::new(&config) {
        Err(SelectionError::MissingMetaModel { candidate }) => assert_eq!(candidate, "SVR"),
        other => panic!("expected a missing meta-model, got {:?}", other.map(|_| ())),
    }

    // Without a budget the store is never read
    let config = SelectorConfig::new(ProblemClass::Regression).with_meta_model_dir(dir.path());
    assert!(ModelEvaluator::new(&config).is_ok());
}

#[test]
fn test_candidate_running_past_deadline_is_dropped() {
    let x = Array2::from_shape_fn((300, 4), |(i, j)| ((i * (j + 5)) % 17) as f64 * 0.5);
    let y = x.column(0).mapv(|v| v * v) + &x.column(3);
    let catalog = Catalog::from_kinds(
        ProblemClass::Regression,
        vec![
            ModelKind::LinearRegression,
            ModelKind::GradientBoostingRegressor { n_estimators: 3000, learning_rate: 0.1, max_depth: 3 },
        ],
    );
    let store = MetaModelStore::from_models([
        MetaModel::constant("LinearRegression", 1.0),
        MetaModel::constant("GradientBoostingRegressor", 0.5),
    ]);
    let config = SelectorConfig::new(ProblemClass::Regression)
        .with_time_limit_secs(0.05)
        .with_random_state(1);
    let mut evaluator = ModelEvaluator::with_parts(&config, catalog, OrderPredictor::with_store(store)).unwrap();
    evaluator.evaluate_models(&x, &y, &MetaFeatures::new()).unwrap();

    assert_eq!(evaluator.outcome(), Some(EvaluatorState::TimedOut));
    assert_eq!(evaluator.records().len(), 1);
    assert_eq!(evaluator.records()[0].candidate.id(), "LinearRegression");
    assert_eq!(evaluator.best_candidate().unwrap().id(), "LinearRegression");
}

#[test]
fn test_unrepresentable_time_limit_is_rejected() {
    for secs in [f64::INFINITY, f64::NAN, 1e300] {
        let config = SelectorConfig::new(ProblemClass::Regression).with_time_limit_secs(secs);
        assert!(
            matches!(ModelEvaluator::new(&config), Err(SelectionError::InvalidParameter { .. })),
            "{}",
            secs
        );
        let catalog = Catalog::from_kinds(ProblemClass::Regression, vec![ModelKind::LinearRegression]);
        assert!(AutoSelect::with_catalog(config.clone(), catalog).is_err());
        assert!(AutoSelect::new(config).is_err());
    }
}

// ============================================================================
// Ranking
// ============================================================================

#[test]
fn test_faster_slightly_worse_candidate_wins() {
    // A: 0.90 in 1s, B: 0.91 in 10s, 5% per tenfold slowdown
    let normalized = ScoreNormalizer::new(ProblemClass::Classification).normalize(&[0.90, 0.91]);
    let ranks = RelativeLandmarkScorer::new(0.05).rank(&normalized, &[1.0, 10.0]);
    assert!(ranks[0] > ranks[1]);
}

#[test]
fn test_equal_scores_rank_by_time() {
    let scorer = RelativeLandmarkScorer::new(0.2);
    let ranks = scorer.rank(&[0.6, 0.6], &[3.0, 3.0]);
    assert_eq!(ranks[0], ranks[1]);
    let ranks = scorer.rank(&[0.6, 0.6], &[3.0, 3.5]);
    assert!(ranks[1] <= ranks[0]);
}
