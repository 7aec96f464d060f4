//! Per-candidate meta-models predicting a relative landmark from
//! meta-features, and the on-disk store that holds them

use super::catalog::Catalog;
use crate::config::ProblemClass;
use crate::error::{Result, SelectionError};
use crate::meta_features::{schema_keys, MetaFeatures};
use crate::tracking::RunLogRow;
use crate::training::ensemble::{EnsembleKind, TreeEnsemble};
use crate::training::Estimator;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rows needed before a forest is fitted instead of a constant
const MIN_FOREST_ROWS: usize = 10;
const FOREST_TREES: usize = 50;

/// The fitted predictor inside a meta-model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetaRegressor {
    Constant { value: f64 },
    Linear { intercept: f64, coefficients: Vec<f64> },
    Forest { ensemble: TreeEnsemble },
}

impl MetaRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        match self {
            MetaRegressor::Constant { value } => Ok(*value),
            MetaRegressor::Linear { intercept, coefficients } => {
                if coefficients.len() != features.len() {
                    return Err(SelectionError::ShapeError {
                        expected: format!("{} coefficients", features.len()),
                        actual: format!("{} coefficients", coefficients.len()),
                    });
                }
                Ok(intercept + coefficients.iter().zip(features).map(|(c, v)| c * v).sum::<f64>())
            }
            MetaRegressor::Forest { ensemble } => {
                let x = Array2::from_shape_vec((1, features.len()), features.to_vec())?;
                Ok(ensemble.predict(&x)?[0])
            }
        }
    }
}

/// Meta-model artifact for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaModel {
    pub candidate: String,
    /// Meta-feature keys, in the order the regressor expects them
    pub feature_names: Vec<String>,
    /// Substitutes for absent or non-finite meta-feature values
    pub fill_values: Vec<f64>,
    pub regressor: MetaRegressor,
}

impl MetaModel {
    /// A meta-model that predicts `value` regardless of input
    pub fn constant(candidate: impl Into<String>, value: f64) -> Self {
        Self {
            candidate: candidate.into(),
            feature_names: Vec::new(),
            fill_values: Vec::new(),
            regressor: MetaRegressor::Constant { value },
        }
    }

    /// Feature vector for `meta`, with non-finite entries replaced by fill values
    fn features(&self, meta: &MetaFeatures) -> Vec<f64> {
        meta.values_for(&self.feature_names)
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                if v.is_finite() {
                    v
                } else {
                    self.fill_values.get(i).copied().unwrap_or(0.0)
                }
            })
            .collect()
    }

    /// Predicted relative landmark for a dataset described by `meta`
    pub fn predict(&self, meta: &MetaFeatures) -> Result<f64> {
        self.regressor.predict(&self.features(meta))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        if model.fill_values.len() != model.feature_names.len() {
            return Err(SelectionError::ValidationError(format!(
                "{}: {} fill values for {} features",
                path.display(),
                model.fill_values.len(),
                model.feature_names.len()
            )));
        }
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Directory holding the meta-models of one problem class
pub fn store_dir(base: &Path, problem: ProblemClass) -> PathBuf {
    base.join(problem.meta_model_dir_name())
}

fn artifact_path(dir: &Path, candidate: &str) -> PathBuf {
    dir.join(format!("{}.json", candidate))
}

/// Read-only set of meta-models, one per catalog candidate
#[derive(Debug, Clone)]
pub struct MetaModelStore {
    models: BTreeMap<String, MetaModel>,
}

impl MetaModelStore {
    /// Load every catalog candidate's artifact from `<base>/<problem>_meta_models/`.
    /// A missing artifact is an error.
    pub fn load(base: &Path, problem: ProblemClass, catalog: &Catalog) -> Result<Self> {
        let dir = store_dir(base, problem);
        let mut models = BTreeMap::new();
        for spec in catalog.iter() {
            let path = artifact_path(&dir, spec.id());
            if !path.is_file() {
                return Err(SelectionError::MissingMetaModel {
                    candidate: spec.id().to_string(),
                });
            }
            let model = MetaModel::load(&path)?;
            if model.candidate != spec.id() {
                return Err(SelectionError::ValidationError(format!(
                    "{} holds the meta-model of {}",
                    path.display(),
                    model.candidate
                )));
            }
            models.insert(spec.id().to_string(), model);
        }
        info!(dir = %dir.display(), n_models = models.len(), "Meta-models loaded");
        Ok(Self { models })
    }

    pub fn from_models(models: impl IntoIterator<Item = MetaModel>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.candidate.clone(), m)).collect(),
        }
    }

    pub fn get(&self, candidate: &str) -> Option<&MetaModel> {
        self.models.get(candidate)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Predicted relative landmark of `candidate`
    pub fn predict(&self, candidate: &str, meta: &MetaFeatures) -> Result<f64> {
        self.models
            .get(candidate)
            .ok_or_else(|| SelectionError::MissingMetaModel {
                candidate: candidate.to_string(),
            })?
            .predict(meta)
    }
}

fn column_fill(rows: &[&RunLogRow], key: &str) -> f64 {
    let finite: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.meta_features.get(key))
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        0.0
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    }
}

/// Fit one meta-model per candidate from persisted runs and write them to
/// `<out_dir>/<problem>_meta_models/`.
///
/// Only runs where the candidate was evaluated are used. With fewer than
/// ten such runs the meta-model predicts their mean.
pub fn train_meta_models(
    rows: &[RunLogRow],
    catalog: &Catalog,
    out_dir: &Path,
    random_state: Option<u64>,
) -> Result<Vec<MetaModel>> {
    let feature_names = schema_keys(catalog.problem_class());
    let dir = store_dir(out_dir, catalog.problem_class());
    std::fs::create_dir_all(&dir)?;

    let mut trained = Vec::with_capacity(catalog.len());
    for spec in catalog.iter() {
        let usable: Vec<&RunLogRow> = rows
            .iter()
            .filter(|r| r.landmark(spec.id()).map_or(false, f64::is_finite))
            .collect();
        let targets: Array1<f64> = usable.iter().filter_map(|r| r.landmark(spec.id())).collect();
        let fill_values: Vec<f64> = feature_names.iter().map(|k| column_fill(&usable, k)).collect();

        let regressor = if usable.len() >= MIN_FOREST_ROWS {
            let mut x = Array2::<f64>::zeros((usable.len(), feature_names.len()));
            for (mut x_row, row) in x.rows_mut().into_iter().zip(&usable) {
                for (j, v) in row.meta_features.values_for(&feature_names).into_iter().enumerate() {
                    x_row[j] = if v.is_finite() { v } else { fill_values[j] };
                }
            }
            let mut ensemble = TreeEnsemble::new(EnsembleKind::RandomForestRegressor, FOREST_TREES);
            if let Some(seed) = random_state {
                ensemble = ensemble.with_random_state(seed);
            }
            ensemble.fit(&x, &targets)?;
            MetaRegressor::Forest { ensemble }
        } else {
            MetaRegressor::Constant {
                value: targets.mean().unwrap_or(0.0),
            }
        };

        let model = MetaModel {
            candidate: spec.id().to_string(),
            feature_names: feature_names.clone(),
            fill_values,
            regressor,
        };
        model.save(&artifact_path(&dir, spec.id()))?;
        debug!(candidate = spec.id(), n_rows = usable.len(), "Meta-model trained");
        trained.push(model);
    }
    info!(dir = %dir.display(), n_models = trained.len(), n_runs = rows.len(), "Meta-models written");
    Ok(trained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::ModelKind;
    use crate::tracking::RunLogSchema;

    fn tiny_catalog() -> Catalog {
        Catalog::from_kinds(
            ProblemClass::Regression,
            vec![ModelKind::LinearRegression, ModelKind::KernelRidge { alpha: 1.0 }],
        )
    }

    #[test]
    fn test_linear_regressor_uses_fill_values() {
        let model = MetaModel {
            candidate: "X".into(),
            feature_names: vec!["a".into(), "b".into()],
            fill_values: vec![0.0, 10.0],
            regressor: MetaRegressor::Linear {
                intercept: 1.0,
                coefficients: vec![2.0, 0.5],
            },
        };
        let mut meta = MetaFeatures::new();
        meta.insert("a", 3.0);
        meta.insert("b", f64::NAN);
        assert_eq!(model.predict(&meta).unwrap(), 1.0 + 6.0 + 5.0);
    }

    #[test]
    fn test_store_reports_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = store_dir(dir.path(), ProblemClass::Regression);
        std::fs::create_dir_all(&store_path).unwrap();
        MetaModel::constant("LinearRegression", 0.5)
            .save(&store_path.join("LinearRegression.json"))
            .unwrap();

        let err = MetaModelStore::load(dir.path(), ProblemClass::Regression, &tiny_catalog()).unwrap_err();
        match err {
            SelectionError::MissingMetaModel { candidate } => assert_eq!(candidate, "KernelRidge"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_train_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = tiny_catalog();
        let schema = RunLogSchema {
            meta_keys: schema_keys(ProblemClass::Regression),
            candidates: catalog.ids().into_iter().map(str::to_string).collect(),
        };
        let rows: Vec<RunLogRow> = (0..12)
            .map(|i| {
                let mut meta = MetaFeatures::new();
                meta.insert("NExamples", 100.0 + i as f64);
                RunLogRow::new(&schema, format!("run{}", i), &meta, &[("LinearRegression".into(), 0.8)])
            })
            .collect();

        let trained = train_meta_models(&rows, &catalog, dir.path(), Some(0)).unwrap();
        assert!(matches!(trained[0].regressor, MetaRegressor::Forest { .. }));
        assert!(matches!(trained[1].regressor, MetaRegressor::Constant { value } if value == 0.0));

        let store = MetaModelStore::load(dir.path(), ProblemClass::Regression, &catalog).unwrap();
        let mut meta = MetaFeatures::new();
        meta.insert("NExamples", 105.0);
        assert!((store.predict("LinearRegression", &meta).unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(store.predict("KernelRidge", &meta).unwrap(), 0.0);
    }
}
