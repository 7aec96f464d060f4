//! Naive Bayes classifiers: Gaussian, multinomial and Bernoulli
//!
//! All three share the same decision rule: the class maximising
//! `log prior + Σ log P(x_j | class)`.

use super::{argmax, check_fit_input, check_predict_input, class_labels, class_index, column_variance, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted class table: sorted labels, log priors and per-class feature rows
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassTable {
    classes: Vec<f64>,
    log_prior: Array1<f64>,
    counts: Vec<usize>,
}

impl ClassTable {
    fn build(y: &Array1<f64>) -> Self {
        let classes = class_labels(y);
        let mut counts = vec![0usize; classes.len()];
        for &label in y {
            counts[class_index(&classes, label)] += 1;
        }
        let n = y.len() as f64;
        let log_prior = counts.iter().map(|&c| (c as f64 / n).ln()).collect();
        Self {
            classes,
            log_prior,
            counts,
        }
    }

    /// Per-class sums of the rows of `x`
    fn feature_sums(&self, x: &Array2<f64>, y: &Array1<f64>) -> Array2<f64> {
        let mut sums = Array2::<f64>::zeros((self.classes.len(), x.ncols()));
        for (row, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            sums.row_mut(class_index(&self.classes, label)).scaled_add(1.0, &row);
        }
        sums
    }

    fn decide(&self, joint: &Array2<f64>) -> Array1<f64> {
        joint
            .axis_iter(Axis(0))
            .map(|row| self.classes[argmax(row)])
            .collect()
    }
}

/// Gaussian naive Bayes with variance smoothing relative to the largest
/// feature variance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNB {
    pub var_smoothing: f64,
    table: Option<ClassTable>,
    means: Array2<f64>,
    variances: Array2<f64>,
}

impl Default for GaussianNB {
    fn default() -> Self {
        Self {
            var_smoothing: 1e-9,
            table: None,
            means: Array2::zeros((0, 0)),
            variances: Array2::zeros((0, 0)),
        }
    }
}

impl GaussianNB {
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }
}

impl Estimator for GaussianNB {
    fn name(&self) -> &'static str {
        "GaussianNB"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let table = ClassTable::build(y);
        let epsilon = self.var_smoothing * column_variance(x).fold(0.0f64, |m, &v| m.max(v));

        let sums = table.feature_sums(x, y);
        let mut means = sums;
        for (k, mut row) in means.axis_iter_mut(Axis(0)).enumerate() {
            row /= table.counts[k] as f64;
        }
        let mut variances = Array2::<f64>::zeros(means.raw_dim());
        for (row, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let k = class_index(&table.classes, label);
            let diff = &row - &means.row(k);
            variances.row_mut(k).scaled_add(1.0, &diff.mapv(|d| d * d));
        }
        for (k, mut row) in variances.axis_iter_mut(Axis(0)).enumerate() {
            row.mapv_inplace(|v| v / table.counts[k] as f64 + epsilon);
        }
        // Constant features in an all-constant dataset
        variances.mapv_inplace(|v| if v > 0.0 { v } else { f64::MIN_POSITIVE });

        self.means = means;
        self.variances = variances;
        self.table = Some(table);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let table = self.table.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, self.means.ncols())?;
        let mut joint = Array2::<f64>::zeros((x.nrows(), table.classes.len()));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            for k in 0..table.classes.len() {
                let mut log_likelihood = table.log_prior[k];
                for j in 0..row.len() {
                    let var = self.variances[[k, j]];
                    let diff = row[j] - self.means[[k, j]];
                    log_likelihood -= 0.5 * ((2.0 * std::f64::consts::PI * var).ln() + diff * diff / var);
                }
                joint[[i, k]] = log_likelihood;
            }
        }
        Ok(table.decide(&joint))
    }
}

/// Multinomial naive Bayes for count-like features. Negative feature values
/// are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialNB {
    pub alpha: f64,
    table: Option<ClassTable>,
    /// log P(feature | class), one row per class
    feature_log_prob: Array2<f64>,
}

impl Default for MultinomialNB {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            table: None,
            feature_log_prob: Array2::zeros((0, 0)),
        }
    }
}

impl Estimator for MultinomialNB {
    fn name(&self) -> &'static str {
        "MultinomialNB"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if x.iter().any(|&v| v < 0.0) {
            return Err(SelectionError::DataError(
                "negative values in input passed to MultinomialNB".to_string(),
            ));
        }
        let table = ClassTable::build(y);
        let smoothed = table.feature_sums(x, y) + self.alpha;
        let totals = smoothed.sum_axis(Axis(1));
        let mut feature_log_prob = smoothed;
        for (k, mut row) in feature_log_prob.axis_iter_mut(Axis(0)).enumerate() {
            let total = totals[k];
            row.mapv_inplace(|v| (v / total).ln());
        }
        self.feature_log_prob = feature_log_prob;
        self.table = Some(table);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let table = self.table.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, self.feature_log_prob.ncols())?;
        let joint = x.dot(&self.feature_log_prob.t()) + &table.log_prior.view().insert_axis(Axis(0));
        Ok(table.decide(&joint))
    }
}

/// Bernoulli naive Bayes over features binarised at a threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BernoulliNB {
    pub alpha: f64,
    pub binarize: f64,
    table: Option<ClassTable>,
    log_p: Array2<f64>,
    log_not_p: Array2<f64>,
}

impl Default for BernoulliNB {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            binarize: 0.0,
            table: None,
            log_p: Array2::zeros((0, 0)),
            log_not_p: Array2::zeros((0, 0)),
        }
    }
}

impl BernoulliNB {
    fn binarized(&self, x: &Array2<f64>) -> Array2<f64> {
        x.mapv(|v| if v > self.binarize { 1.0 } else { 0.0 })
    }
}

impl Estimator for BernoulliNB {
    fn name(&self) -> &'static str {
        "BernoulliNB"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let table = ClassTable::build(y);
        let xb = self.binarized(x);
        let mut p = table.feature_sums(&xb, y);
        for (k, mut row) in p.axis_iter_mut(Axis(0)).enumerate() {
            let denominator = table.counts[k] as f64 + 2.0 * self.alpha;
            row.mapv_inplace(|v| (v + self.alpha) / denominator);
        }
        self.log_p = p.mapv(f64::ln);
        self.log_not_p = p.mapv(|v| (1.0 - v).ln());
        self.table = Some(table);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let table = self.table.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, self.log_p.ncols())?;
        let xb = self.binarized(x);
        let present = xb.dot(&self.log_p.t());
        let absent = xb.mapv(|v| 1.0 - v).dot(&self.log_not_p.t());
        let joint = present + absent + &table.log_prior.view().insert_axis(Axis(0));
        Ok(table.decide(&joint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gaussian_nb_separates_clusters() {
        let x = array![[1.0, 2.0], [1.2, 1.8], [0.9, 2.1], [6.0, 7.0], [6.2, 7.1], [5.8, 6.9]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = GaussianNB::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.predict(&array![[5.5, 6.5]]).unwrap(), array![1.0]);
    }

    #[test]
    fn test_gaussian_nb_constant_feature() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [8.0, 0.0], [9.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = GaussianNB::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_multinomial_nb_counts() {
        let x = array![[5.0, 0.0, 1.0], [4.0, 1.0, 0.0], [0.0, 6.0, 1.0], [1.0, 5.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = MultinomialNB::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_multinomial_nb_rejects_negative_input() {
        let x = array![[1.0, -0.5], [0.0, 2.0]];
        let y = array![0.0, 1.0];
        let err = MultinomialNB::default().fit(&x, &y).unwrap_err();
        assert!(matches!(err, SelectionError::DataError(_)));
    }

    #[test]
    fn test_bernoulli_nb_binary_patterns() {
        let x = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let y = array![2.0, 2.0, 5.0, 5.0];
        let mut model = BernoulliNB::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
