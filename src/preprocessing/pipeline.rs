//! Fitted preprocessing pipeline: encode and impute, then optionally scale

use super::encoder::{ColumnEncoder, ColumnPlan};
use super::imputer::ImputeStrategy;
use super::scaler::StandardScaler;
use super::{PreprocessingConfig, Transform};
use crate::dataset::Dataset;
use crate::error::{Result, SelectionError};
use ndarray::Array2;
use std::fmt::Write;
use tracing::debug;

/// Imputation, categorical encoding and optional scaling as one step
#[derive(Debug, Clone)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    encoder: Option<ColumnEncoder>,
    scaler: Option<StandardScaler>,
}

impl DataPreprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self {
            config,
            encoder: None,
            scaler: None,
        }
    }

    fn encode(&self, encoder: &ColumnEncoder, data: &Dataset) -> Result<Array2<f64>> {
        let buffer = encoder.encode(data.columns(), data.n_rows())?;
        Ok(Array2::from_shape_vec((data.n_rows(), encoder.output_width()), buffer)?)
    }
}

impl Transform for DataPreprocessor {
    fn fit_transform(&mut self, data: &Dataset) -> Result<Array2<f64>> {
        let encoder = ColumnEncoder::fit(
            data.feature_names(),
            data.columns(),
            self.config.max_onehot_categories,
            &self.config.ordinal_features,
            ImputeStrategy::Mean,
        )?;
        let mut x = self.encode(&encoder, data)?;
        if self.config.scale {
            let mut scaler = StandardScaler::new();
            x = scaler.fit_transform(&x)?;
            self.scaler = Some(scaler);
        }
        debug!(
            input_features = data.n_features(),
            output_features = x.ncols(),
            "preprocessing fitted"
        );
        self.encoder = Some(encoder);
        Ok(x)
    }

    fn transform(&self, data: &Dataset) -> Result<Array2<f64>> {
        let encoder = self.encoder.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        let x = self.encode(encoder, data)?;
        match &self.scaler {
            Some(scaler) => scaler.transform(&x),
            None => Ok(x),
        }
    }

    fn describe(&self) -> String {
        let mut text = String::from("DataPreprocessor(");
        match &self.encoder {
            Some(encoder) => {
                let (mut numeric, mut one_hot, mut ordinal) = (0, 0, 0);
                for plan in encoder.plans() {
                    match plan {
                        ColumnPlan::Numeric { .. } => numeric += 1,
                        ColumnPlan::OneHot { .. } => one_hot += 1,
                        ColumnPlan::Ordinal { .. } => ordinal += 1,
                    }
                }
                let _ = write!(
                    text,
                    "numeric={} mean-imputed, one_hot={}, ordinal={}",
                    numeric, one_hot, ordinal
                );
            }
            None => text.push_str("unfitted"),
        }
        if self.config.scale {
            text.push_str(", standard_scaling");
        }
        text.push(')');
        text
    }
}
