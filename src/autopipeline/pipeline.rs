//! End-to-end selection pipeline

use crate::config::SelectorConfig;
use crate::dataset::Dataset;
use crate::error::{Result, SelectionError};
use crate::meta_features::{MetaFeatureExtractor, MetaFeatures};
use crate::preprocessing::{Preprocessing, StandardPreprocessing, Transform};
use crate::selection::{Catalog, ModelEvaluator, ModelKind, OrderPredictor, RelativeLandmark};
use crate::tracking::{RunLog, RunLogRow, RunLogSchema};
use crate::training::Estimator;
use ndarray::{Array1, Array2};
use std::path::Path;
use tracing::info;

/// Steps fitted by the last call to [`AutoSelect::fit`]
#[derive(Debug)]
struct FittedPipeline {
    preprocessing: Option<Box<dyn Transform>>,
    kind: ModelKind,
    model: Box<dyn Estimator>,
}

/// Optional initial transform, preprocessing, then the selected model.
///
/// `fit` extracts meta-features around the preprocessing step, evaluates
/// the catalog, and trains the best candidate on the preprocessed matrix.
#[derive(Debug)]
pub struct AutoSelect {
    config: SelectorConfig,
    initial: Option<Box<dyn Transform>>,
    preprocessing: Box<dyn Preprocessing>,
    extractor: MetaFeatureExtractor,
    evaluator: ModelEvaluator,
    fitted: Option<FittedPipeline>,
}

impl AutoSelect {
    /// Pipeline over the built-in catalog
    pub fn new(config: SelectorConfig) -> Result<Self> {
        let evaluator = ModelEvaluator::new(&config)?;
        Ok(Self::assemble(config, evaluator))
    }

    /// Pipeline restricted to `catalog`
    pub fn with_catalog(config: SelectorConfig, catalog: Catalog) -> Result<Self> {
        config.validate()?;
        let order = OrderPredictor::from_config(&config, &catalog)?;
        let evaluator = ModelEvaluator::with_parts(&config, catalog, order)?;
        Ok(Self::assemble(config, evaluator))
    }

    fn assemble(config: SelectorConfig, evaluator: ModelEvaluator) -> Self {
        Self {
            extractor: MetaFeatureExtractor::from_config(&config),
            config,
            initial: None,
            preprocessing: Box::new(StandardPreprocessing::default()),
            evaluator,
            fitted: None,
        }
    }

    /// Run `transform` on the raw data before anything else
    pub fn with_initial_transform(mut self, transform: Box<dyn Transform>) -> Self {
        self.initial = Some(transform);
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: impl Preprocessing + 'static) -> Self {
        self.preprocessing = Box::new(preprocessing);
        self
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &ModelEvaluator {
        &self.evaluator
    }

    /// Select and train a model for `data`
    pub fn fit(&mut self, data: &Dataset) -> Result<&mut Self> {
        self.fitted = None;
        self.extractor = MetaFeatureExtractor::from_config(&self.config);

        let rewrapped;
        let data = match self.initial.as_mut() {
            Some(initial) => {
                let x = initial.fit_transform(data)?;
                rewrapped = Dataset::from_matrix(&x, data.target())?;
                &rewrapped
            }
            None => data,
        };

        self.extractor.extract_initial(data);

        let mut preprocessing = self.preprocessing.get_pipeline(data);
        let x = match preprocessing.as_mut() {
            Some(step) => step.fit_transform(data)?,
            None => data.numeric_matrix()?,
        };
        let y = data.target().clone();

        self.extractor.extract_preprocessed(&x, &y);
        self.evaluator.evaluate_models(&x, &y, self.extractor.as_dict())?;

        let kind = self.evaluator.best_candidate()?.kind.clone();
        let mut model = self.evaluator.get_best_model()?;
        model.fit(&x, &y)?;
        info!(model = kind.id(), rows = x.nrows(), features = x.ncols(), "Selected model fitted");

        self.fitted = Some(FittedPipeline {
            preprocessing,
            kind,
            model,
        });
        Ok(self)
    }

    fn fitted(&self) -> Result<&FittedPipeline> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)
    }

    /// Apply every fitted step before the model
    pub fn transform(&self, data: &Dataset) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        let rewrapped;
        let data = match &self.initial {
            Some(initial) => {
                let x = initial.transform(data)?;
                rewrapped = Dataset::from_matrix(&x, data.target())?;
                &rewrapped
            }
            None => data,
        };
        match &fitted.preprocessing {
            Some(step) => step.transform(data),
            None => data.numeric_matrix(),
        }
    }

    pub fn predict(&self, data: &Dataset) -> Result<Array1<f64>> {
        let x = self.transform(data)?;
        self.fitted()?.model.predict(&x)
    }

    /// Indented listing of the fitted steps
    pub fn describe(&self) -> Result<String> {
        let fitted = self.fitted()?;
        let mut text = String::new();
        if let Some(initial) = &self.initial {
            text.push_str(&format!("Initial pipeline:\n\t{}\n", initial.describe()));
        }
        if let Some(step) = &fitted.preprocessing {
            text.push_str(&format!("Preprocessing pipeline:\n\t{}\n", step.describe()));
        }
        let params = serde_json::to_string(&fitted.kind)?;
        text.push_str(&format!("Model:\n\t{} {}\n", fitted.kind.id(), params));
        Ok(text)
    }

    pub fn meta_features(&self) -> &MetaFeatures {
        self.extractor.as_dict()
    }

    pub fn relative_landmarks(&self) -> &[RelativeLandmark] {
        self.evaluator.relative_landmarks()
    }

    /// Append this run's meta-features and relative landmarks to the run log
    pub fn save_meta_data(&self, path: impl AsRef<Path>, task_name: &str) -> Result<()> {
        let schema = RunLogSchema::for_problem(self.config.problem_class);
        let row = RunLogRow::new(&schema, task_name, self.meta_features(), &self.evaluator.landmark_pairs());
        RunLog::new(path.as_ref(), schema).append(&row)
    }
}
