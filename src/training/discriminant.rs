//! Linear discriminant analysis
//!
//! Classes share one pooled within-class covariance. The discriminant for
//! class k is `x·Σ⁻¹μₖ - ½ μₖ·Σ⁻¹μₖ + log πₖ`.

use super::linalg::cholesky_solve;
use super::{argmax, check_fit_input, check_predict_input, class_labels, class_index, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearDiscriminantAnalysis {
    /// Added to the covariance diagonal, relative to its mean diagonal value
    pub shrinkage: f64,
    /// One row of Σ⁻¹μₖ per class
    coef: Option<Array2<f64>>,
    intercept: Array1<f64>,
    classes: Vec<f64>,
}

impl Default for LinearDiscriminantAnalysis {
    fn default() -> Self {
        Self {
            shrinkage: 1e-6,
            coef: None,
            intercept: Array1::zeros(0),
            classes: Vec::new(),
        }
    }
}

impl Estimator for LinearDiscriminantAnalysis {
    fn name(&self) -> &'static str {
        "LinearDiscriminantAnalysis"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        self.classes = class_labels(y);
        let n_classes = self.classes.len();

        let mut means = Array2::<f64>::zeros((n_classes, p));
        let mut counts = vec![0usize; n_classes];
        for (row, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let k = class_index(&self.classes, label);
            means.row_mut(k).scaled_add(1.0, &row);
            counts[k] += 1;
        }
        for (k, mut mean) in means.axis_iter_mut(Axis(0)).enumerate() {
            mean /= counts[k] as f64;
        }

        let mut within = Array2::<f64>::zeros((n, p));
        for (i, (row, &label)) in x.axis_iter(Axis(0)).zip(y.iter()).enumerate() {
            let k = class_index(&self.classes, label);
            within.row_mut(i).assign(&(&row - &means.row(k)));
        }
        let dof = n.saturating_sub(n_classes).max(1) as f64;
        let mut covariance = within.t().dot(&within) / dof;
        let ridge = self.shrinkage * (covariance.diag().sum() / p.max(1) as f64).max(1.0);
        for j in 0..p {
            covariance[[j, j]] += ridge;
        }

        let mut coef = Array2::<f64>::zeros((n_classes, p));
        let mut intercept = Array1::<f64>::zeros(n_classes);
        for k in 0..n_classes {
            let mean = means.row(k).to_owned();
            let solved = cholesky_solve(&covariance, &mean).ok_or_else(|| {
                SelectionError::ComputationError("singular pooled covariance".to_string())
            })?;
            intercept[k] = -0.5 * mean.dot(&solved) + (counts[k] as f64 / n as f64).ln();
            coef.row_mut(k).assign(&solved);
        }

        self.coef = Some(coef);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coef.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, coef.ncols())?;
        let scores = x.dot(&coef.t()) + &self.intercept.view().insert_axis(Axis(0));
        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| self.classes[argmax(row)])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_lda_two_gaussians() {
        let x = array![
            [1.0, 2.0],
            [1.5, 1.8],
            [0.8, 2.4],
            [1.2, 2.2],
            [4.0, 5.0],
            [4.4, 5.3],
            [3.8, 4.6],
            [4.2, 4.9],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut model = LinearDiscriminantAnalysis::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_lda_constant_feature_is_regularised() {
        let x = array![[0.0, 1.0], [0.2, 1.0], [3.0, 1.0], [3.2, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = LinearDiscriminantAnalysis::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[0.1, 1.0], [3.1, 1.0]]).unwrap(), array![0.0, 1.0]);
    }
}
