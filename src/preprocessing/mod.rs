//! Data preprocessing module
//!
//! The selection engine sees preprocessing only through [`Transform`] and
//! [`Preprocessing`]. The default [`StandardPreprocessing`] provides:
//! - Missing value imputation (mean for numeric, most frequent for categories)
//! - Categorical encoding (one-hot for low cardinality, ordinal otherwise)
//! - Optional standard scaling

mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use encoder::{ColumnEncoder, ColumnPlan};
pub use imputer::{mean_fill, most_frequent, ImputeStrategy};
pub use pipeline::DataPreprocessor;
pub use scaler::StandardScaler;

use crate::dataset::Dataset;
use crate::error::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A fitted-on-demand data transform producing a dense numeric matrix
pub trait Transform: Send + Sync + Debug {
    /// Fit on `data` and return its transformed matrix
    fn fit_transform(&mut self, data: &Dataset) -> Result<Array2<f64>>;

    /// Apply the fitted transform
    fn transform(&self, data: &Dataset) -> Result<Array2<f64>>;

    /// One-line human-readable summary
    fn describe(&self) -> String;
}

/// Builds the preprocessing step for a dataset, or `None` when no step is
/// needed
pub trait Preprocessing: Send + Sync + Debug {
    fn get_pipeline(&self, data: &Dataset) -> Option<Box<dyn Transform>>;
}

/// Configuration for data preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Maximum number of categories for one-hot encoding.
    /// Columns with more categories are ordinal-encoded.
    pub max_onehot_categories: usize,
    /// Categorical columns with a declared category order
    pub ordinal_features: Vec<(String, Vec<String>)>,
    /// Whether to standardise the encoded matrix
    pub scale: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            max_onehot_categories: 10,
            ordinal_features: Vec::new(),
            scale: false,
        }
    }
}

/// Default preprocessing collaborator
#[derive(Debug, Clone, Default)]
pub struct StandardPreprocessing {
    config: PreprocessingConfig,
}

impl StandardPreprocessing {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    /// Declare the category order of a categorical column
    pub fn with_ordinal_feature(mut self, name: impl Into<String>, order: Vec<String>) -> Self {
        self.config.ordinal_features.push((name.into(), order));
        self
    }

    pub fn with_scaling(mut self, scale: bool) -> Self {
        self.config.scale = scale;
        self
    }
}

impl Preprocessing for StandardPreprocessing {
    fn get_pipeline(&self, data: &Dataset) -> Option<Box<dyn Transform>> {
        if data.is_all_numeric() && !data.has_missing() && !self.config.scale {
            return None;
        }
        Some(Box::new(DataPreprocessor::new(self.config.clone())))
    }
}
