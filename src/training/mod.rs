//! Learners, cross-validation and scoring
//!
//! Every candidate and landmark model implements [`Estimator`], a minimal
//! fit/predict contract over dense `f64` matrices. Classifiers receive
//! label-encoded targets and predict those same label values.

pub mod boosting;
pub mod calibration;
pub mod cross_validation;
pub mod decision_tree;
pub mod discriminant;
pub mod ensemble;
pub mod knn;
pub(crate) mod linalg;
pub mod linear_models;
pub mod logistic;
pub mod metrics;
pub mod naive_bayes;
pub mod neural_network;
pub mod online;
pub mod projection;
pub mod svm;

pub use cross_validation::{cross_val_score, CVSplit, CVStrategy, CrossValidator};
pub use metrics::Scorer;

use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::fmt::Debug;

/// A trainable model
pub trait Estimator: Send + Sync + Debug {
    /// Catalog name of the learner
    fn name(&self) -> &'static str;

    /// Fit on a feature matrix and target vector
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Validate fit inputs: matching lengths, at least one row, finite values
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SelectionError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(SelectionError::TrainingError("cannot fit on zero rows".to_string()));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(SelectionError::TrainingError(
            "input contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Validate that `x` has the width seen at fit time
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(SelectionError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Sorted distinct label values
pub(crate) fn class_labels(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

/// Index of `label` in a sorted class list
pub(crate) fn class_index(classes: &[f64], label: f64) -> usize {
    classes
        .iter()
        .position(|&c| c == label)
        .unwrap_or(0)
}

/// Per-row class index for `y`
pub(crate) fn encode_classes(classes: &[f64], y: &Array1<f64>) -> Vec<usize> {
    y.iter().map(|&v| class_index(classes, v)).collect()
}

/// Index of the largest value; ties resolve to the first
pub(crate) fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Copy the listed rows of `x`
pub(crate) fn take_rows(x: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    x.select(Axis(0), rows)
}

/// Copy the listed entries of `y`
pub(crate) fn take_values(y: &Array1<f64>, rows: &[usize]) -> Array1<f64> {
    y.select(Axis(0), rows)
}

/// Per-column variance of `x` (population)
pub(crate) fn column_variance(x: &Array2<f64>) -> Array1<f64> {
    x.var_axis(Axis(0), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_labels_sorted() {
        let y = array![2.0, 0.0, 1.0, 2.0];
        assert_eq!(class_labels(&y), vec![0.0, 1.0, 2.0]);
        assert_eq!(encode_classes(&[0.0, 1.0, 2.0], &y), vec![2, 0, 1, 2]);
    }

    #[test]
    fn test_check_fit_input_rejects_nan() {
        let x = array![[1.0], [f64::NAN]];
        assert!(check_fit_input(&x, &array![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_argmax_first_on_tie() {
        assert_eq!(argmax(array![1.0, 3.0, 3.0].view()), 1);
    }
}
