use automl_selector::config::{ProblemClass, SelectorConfig};
use automl_selector::dataset::Dataset;
use automl_selector::meta_features::{MetaFeatureExtractor, MetaFeatures};
use automl_selector::selection::{Catalog, ModelEvaluator, ModelKind, OrderPredictor, RelativeLandmarkScorer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;

fn create_classification_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = rand::thread_rng();
    let y = Array1::from_shape_fn(n_rows, |i| (i % 2) as f64);
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, _)| y[i] + rng.gen::<f64>() * 2.0);
    Dataset::from_matrix(&x, &y).unwrap()
}

fn bench_meta_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("meta_features");
    group.sample_size(10); // Landmarks cross-validate four baselines

    for n_rows in [200, 1000, 5000].iter() {
        let data = create_classification_data(*n_rows, 10);
        let x = data.numeric_matrix().unwrap();
        let config = SelectorConfig::new(ProblemClass::Classification).with_random_state(0);

        group.bench_with_input(BenchmarkId::new("extract", n_rows), &data, |b, data| {
            b.iter(|| {
                let mut extractor = MetaFeatureExtractor::from_config(&config);
                extractor.extract_initial(black_box(data));
                extractor.extract_preprocessed(black_box(&x), data.target());
            })
        });
    }

    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");
    group.sample_size(10);

    let catalog = Catalog::from_kinds(
        ProblemClass::Classification,
        vec![
            ModelKind::GaussianNB { var_smoothing: 1e-9 },
            ModelKind::NearestCentroid,
            ModelKind::DecisionTreeClassifier { max_depth: Some(5) },
            ModelKind::KNeighborsClassifier { n_neighbors: 5 },
        ],
    );
    let config = SelectorConfig::new(ProblemClass::Classification).with_random_state(0);

    for n_rows in [500, 2000].iter() {
        let data = create_classification_data(*n_rows, 8);
        let x = data.numeric_matrix().unwrap();

        group.bench_with_input(BenchmarkId::new("evaluate_models", n_rows), &x, |b, x| {
            b.iter(|| {
                let mut evaluator =
                    ModelEvaluator::with_parts(&config, catalog.clone(), OrderPredictor::unordered()).unwrap();
                evaluator
                    .evaluate_models(black_box(x), data.target(), &MetaFeatures::new())
                    .unwrap();
                evaluator.best_candidate().map(|c| c.id()).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let scorer = RelativeLandmarkScorer::new(0.05);
    let scores: Vec<f64> = (0..19).map(|i| 0.5 + i as f64 * 0.02).collect();
    let seconds: Vec<f64> = (0..19).map(|i| 0.01 * (i + 1) as f64).collect();

    c.bench_function("rank", |b| b.iter(|| scorer.rank(black_box(&scores), black_box(&seconds))));
}

criterion_group!(benches, bench_meta_features, bench_evaluation, bench_ranking);
criterion_main!(benches);
