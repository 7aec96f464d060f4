//! Multinomial logistic regression, plain and with cross-validated
//! regularisation strength

use super::boosting::softmax_rows;
use super::cross_validation::{CVStrategy, CrossValidator};
use super::metrics::accuracy;
use super::{
    argmax, check_fit_input, check_predict_input, class_labels, encode_classes, take_rows, take_values, Estimator,
};
use crate::error::{Result, SelectionError};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// L2-penalised softmax model trained with accelerated gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SoftmaxModel {
    /// (n_features + 1) x n_classes, last row is the intercept
    weights: Array2<f64>,
}

impl SoftmaxModel {
    fn augment(x: &Array2<f64>) -> Array2<f64> {
        let mut design = Array2::<f64>::ones((x.nrows(), x.ncols() + 1));
        design.slice_mut(s![.., ..x.ncols()]).assign(x);
        design
    }

    fn train(x: &Array2<f64>, codes: &[usize], n_classes: usize, c: f64, max_iter: usize) -> Self {
        let design = Self::augment(x);
        let (n, d) = design.dim();
        let n_f = n as f64;

        let mut targets = Array2::<f64>::zeros((n, n_classes));
        for (i, &k) in codes.iter().enumerate() {
            targets[[i, k]] = 1.0;
        }

        // Intercept row is not penalised
        let penalty = 1.0 / (c * n_f);
        let frobenius = design.mapv(|v| v * v).sum();
        let lipschitz = 0.5 * frobenius / n_f + penalty;
        let step = 1.0 / lipschitz.max(1e-12);

        let mut weights = Array2::<f64>::zeros((d, n_classes));
        let mut momentum = weights.clone();
        let mut t = 1.0f64;

        for _ in 0..max_iter {
            let probabilities = softmax_rows(&design.dot(&momentum));
            let mut gradient = design.t().dot(&(probabilities - &targets)) / n_f;
            {
                let mut penalised = gradient.slice_mut(s![..d - 1, ..]);
                penalised.scaled_add(penalty, &momentum.slice(s![..d - 1, ..]));
            }

            let next = &momentum - &(gradient * step);
            let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
            let change = (&next - &weights).mapv(f64::abs).fold(0.0f64, |m, &v| m.max(v));
            momentum = &next + &((&next - &weights) * ((t - 1.0) / t_next));
            weights = next;
            t = t_next;

            if change < 1e-6 {
                break;
            }
        }

        Self { weights }
    }

    fn decision(&self, x: &Array2<f64>) -> Array2<f64> {
        Self::augment(x).dot(&self.weights)
    }
}

/// Multinomial logistic regression with inverse regularisation strength `c`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub c: f64,
    pub max_iter: usize,
    model: Option<SoftmaxModel>,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LogisticRegression {
    pub fn new(c: f64) -> Self {
        Self {
            c,
            max_iter: 500,
            model: None,
            classes: Vec::new(),
            n_features: 0,
        }
    }

    /// Class probabilities, one column per sorted class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.model.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, self.n_features)?;
        Ok(softmax_rows(&model.decision(x)))
    }
}

impl Estimator for LogisticRegression {
    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.c <= 0.0 {
            return Err(SelectionError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        self.classes = class_labels(y);
        self.n_features = x.ncols();
        let codes = encode_classes(&self.classes, y);
        self.model = Some(SoftmaxModel::train(x, &codes, self.classes.len(), self.c, self.max_iter));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probabilities = self.predict_proba(x)?;
        Ok(probabilities
            .axis_iter(Axis(0))
            .map(|row| self.classes[argmax(row)])
            .collect())
    }
}

/// Logistic regression choosing `C` from a log-spaced grid by stratified
/// cross-validated accuracy, then refitting on all rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionCV {
    pub cs: Vec<f64>,
    pub cv_folds: usize,
    best: Option<LogisticRegression>,
}

impl Default for LogisticRegressionCV {
    fn default() -> Self {
        // 10 values from 1e-4 to 1e4
        let cs = (0..10).map(|i| 10f64.powf(-4.0 + 8.0 * i as f64 / 9.0)).collect();
        Self {
            cs,
            cv_folds: 5,
            best: None,
        }
    }
}

impl LogisticRegressionCV {
    /// Regularisation strength chosen at fit time
    pub fn chosen_c(&self) -> Option<f64> {
        self.best.as_ref().map(|m| m.c)
    }
}

impl Estimator for LogisticRegressionCV {
    fn name(&self) -> &'static str {
        "LogisticRegressionCV"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.cs.is_empty() {
            return Err(SelectionError::InvalidParameter {
                name: "Cs".to_string(),
                value: "[]".to_string(),
                reason: "at least one candidate is required".to_string(),
            });
        }
        let folds = self.cv_folds.min(x.nrows()).max(2);
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: folds, shuffle: false }).split(y)?;

        let mut best_c = self.cs[0];
        let mut best_score = f64::NEG_INFINITY;
        for &c in &self.cs {
            let mut total = 0.0;
            for split in &splits {
                let mut model = LogisticRegression::new(c);
                model.fit(&take_rows(x, &split.train_indices), &take_values(y, &split.train_indices))?;
                let predictions = model.predict(&take_rows(x, &split.test_indices))?;
                total += accuracy(&take_values(y, &split.test_indices), &predictions);
            }
            let score = total / splits.len() as f64;
            if score > best_score {
                best_score = score;
                best_c = c;
            }
        }

        let mut model = LogisticRegression::new(best_c);
        model.fit(x, y)?;
        self.best = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.best.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let shift = if i < 20 { -2.0 } else { 2.0 };
            shift + ((i * 3 + j * 5) % 7) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(40, |i| if i < 20 { 3.0 } else { 7.0 });
        (x, y)
    }

    #[test]
    fn test_logistic_regression_separable() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&array![[-2.0, -2.0]]).unwrap();
        assert!(proba[[0, 0]] > 0.9);
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_regression_cv_chooses_grid_value() {
        let (x, y) = separable();
        let mut model = LogisticRegressionCV::default();
        model.fit(&x, &y).unwrap();
        let c = model.chosen_c().unwrap();
        assert!(model.cs.contains(&c));
        let predictions = model.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 36, "only {} correct", correct);
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let (x, y) = separable();
        assert!(LogisticRegression::new(0.0).fit(&x, &y).is_err());
    }
}
