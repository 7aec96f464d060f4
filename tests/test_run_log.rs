//! Integration tests for the run log and meta-model training

use automl_selector::autopipeline::AutoSelect;
use automl_selector::config::{ProblemClass, SelectorConfig};
use automl_selector::dataset::Dataset;
use automl_selector::error::SelectionError;
use automl_selector::meta_features::{schema_keys, MetaFeatures};
use automl_selector::selection::{train_meta_models, Catalog, MetaModelStore, MetaRegressor, ModelKind, OrderPredictor};
use automl_selector::tracking::{RunLog, RunLogRow, RunLogSchema};
use ndarray::{Array1, Array2};
use std::io::Write;

// ============================================================================
// Fixtures
// ============================================================================

fn regression_data() -> Dataset {
    let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * (j + 2)) % 9) as f64);
    let y: Array1<f64> = x.column(0).mapv(|v| 2.0 * v) - &x.column(1);
    Dataset::from_matrix(&x, &y).unwrap()
}

/// Every schema meta-feature set to `base + index`
fn meta_at(problem: ProblemClass, base: f64) -> MetaFeatures {
    let mut meta = MetaFeatures::new();
    for (i, key) in schema_keys(problem).into_iter().enumerate() {
        meta.insert(key, base + i as f64);
    }
    meta
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_rows_read_back_in_schema_order() {
    let dir = tempfile::tempdir().unwrap();
    let schema = RunLogSchema::for_problem(ProblemClass::Regression);
    let log = RunLog::new(dir.path().join("runs").join("log.csv"), schema.clone());

    let mut meta = MetaFeatures::new();
    // Inserted out of schema order
    meta.insert("YStd", 1.0 / 3.0);
    meta.insert("NExamples", 150.0);
    meta.insert("CorrelationMean", f64::NAN);
    let landmarks = vec![("SVR".to_string(), 0.123456789), ("LinearRegression".to_string(), 1e-7)];

    log.append(&RunLogRow::new(&schema, "first", &meta, &landmarks)).unwrap();
    log.append(&RunLogRow::new(&schema, "second", &MetaFeatures::new(), &[])).unwrap();

    let rows = log.read().unwrap();
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.task, "first");
    let keys: Vec<&str> = first.meta_features.keys().collect();
    assert_eq!(keys, schema.meta_keys.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(first.meta_features.get("YStd"), Some(1.0 / 3.0));
    assert_eq!(first.meta_features.get("NExamples"), Some(150.0));
    assert!(first.meta_features.get("CorrelationMean").unwrap().is_nan());
    assert_eq!(first.landmark("SVR"), Some(0.123456789));
    assert_eq!(first.landmark("LinearRegression"), Some(1e-7));
    assert_eq!(first.landmark("NuSVR"), None);

    assert!(rows[1].meta_features.get("NExamples").unwrap().is_nan());
    assert!(rows[1].relative_landmarks.iter().all(|(_, v)| v.is_none()));

    let header = std::fs::read_to_string(log.path()).unwrap();
    assert!(header.starts_with("Task,NExamples,NFeatures,"));
}

#[test]
fn test_foreign_header_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Task,Something,Else").unwrap();
    writeln!(file, "t,1,2").unwrap();
    file.flush().unwrap();

    let schema = RunLogSchema::for_problem(ProblemClass::Classification);
    let log = RunLog::new(file.path(), schema.clone());
    assert!(matches!(log.read(), Err(SelectionError::SchemaMismatch(_))));
    let row = RunLogRow::new(&schema, "t", &MetaFeatures::new(), &[]);
    assert!(matches!(log.append(&row), Err(SelectionError::SchemaMismatch(_))));
}

#[test]
fn test_auto_select_appends_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("regression_log.csv");
    let catalog = Catalog::from_kinds(
        ProblemClass::Regression,
        vec![ModelKind::LinearRegression, ModelKind::KNeighborsRegressor { n_neighbors: 3 }],
    );
    let config = SelectorConfig::new(ProblemClass::Regression).with_random_state(4);
    let mut auto = AutoSelect::with_catalog(config, catalog).unwrap();
    auto.fit(&regression_data()).unwrap();

    auto.save_meta_data(&path, "run-a").unwrap();
    auto.save_meta_data(&path, "run-b").unwrap();

    let rows = RunLog::new(&path, RunLogSchema::for_problem(ProblemClass::Regression))
        .read()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].task, "run-b");
    for row in &rows {
        assert_eq!(row.meta_features.get("NExamples"), Some(40.0));
        assert!(row.landmark("LinearRegression").unwrap().is_finite());
        assert!(row.landmark("KNeighborsRegressor").unwrap().is_finite());
        assert_eq!(row.landmark("SVR"), None);
    }
}

// ============================================================================
// Meta-model training
// ============================================================================

#[test]
fn test_trained_store_orders_candidates() {
    let problem = ProblemClass::Regression;
    let schema = RunLogSchema::for_problem(problem);
    let rows: Vec<RunLogRow> = (0..12)
        .map(|i| {
            let large = i % 2 == 0;
            let meta = meta_at(problem, if large { 1000.0 } else { 0.0 });
            let landmarks = vec![
                ("KNeighborsRegressor".to_string(), if large { 0.9 } else { 0.1 }),
                ("LinearRegression".to_string(), 0.5),
            ];
            RunLogRow::new(&schema, format!("task-{}", i), &meta, &landmarks)
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::for_problem(problem);
    let models = train_meta_models(&rows, &catalog, dir.path(), Some(3)).unwrap();
    assert_eq!(models.len(), catalog.len());
    let knn = models.iter().find(|m| m.candidate == "KNeighborsRegressor").unwrap();
    assert!(matches!(knn.regressor, MetaRegressor::Forest { .. }));
    let svr = models.iter().find(|m| m.candidate == "SVR").unwrap();
    assert!(matches!(svr.regressor, MetaRegressor::Constant { value } if value == 0.0));

    let store = MetaModelStore::load(dir.path(), problem, &catalog).unwrap();
    assert_eq!(store.len(), catalog.len());
    let order = OrderPredictor::with_store(store);

    let ordered = order.predict_order(&catalog, &meta_at(problem, 1000.0)).unwrap();
    assert_eq!(ordered[0].id(), "KNeighborsRegressor");
    assert_eq!(ordered[1].id(), "LinearRegression");

    let ordered = order.predict_order(&catalog, &meta_at(problem, 0.0)).unwrap();
    assert_eq!(ordered[0].id(), "LinearRegression");
    assert_eq!(ordered[1].id(), "KNeighborsRegressor");
    assert_eq!(ordered.len(), catalog.len());
}
