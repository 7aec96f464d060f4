//! Sparse and latent-projection regressors: orthogonal matching pursuit and
//! partial least squares

use super::cross_validation::{CVStrategy, CrossValidator};
use super::linalg::{center_columns, gauss_solve, solve_normal_equations};
use super::linear_models::LinearFit;
use super::{check_fit_input, take_rows, take_values, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Greedy forward selection path on centred data. Returns the coefficient
/// vector after each step, up to `max_steps` non-zeros.
fn omp_path(xc: &Array2<f64>, yc: &Array1<f64>, max_steps: usize) -> Result<Vec<Array1<f64>>> {
    let p = xc.ncols();
    let norms: Vec<f64> = xc
        .axis_iter(Axis(1))
        .map(|c| c.dot(&c).sqrt())
        .collect();

    let mut active: Vec<usize> = Vec::new();
    let mut residual = yc.clone();
    let mut path = Vec::with_capacity(max_steps);

    for _ in 0..max_steps.min(p) {
        let correlations = xc.t().dot(&residual);
        let next = (0..p)
            .filter(|j| !active.contains(j) && norms[*j] > 1e-12)
            .max_by(|&a, &b| {
                let ca = correlations[a].abs() / norms[a];
                let cb = correlations[b].abs() / norms[b];
                ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
            });
        let Some(j) = next else { break };
        active.push(j);

        let xa = xc.select(Axis(1), &active);
        let beta = solve_normal_equations(&xa, yc, 0.0)?;
        residual = yc - &xa.dot(&beta);

        let mut coef = Array1::<f64>::zeros(p);
        for (k, &feature) in active.iter().enumerate() {
            coef[feature] = beta[k];
        }
        path.push(coef);

        if residual.dot(&residual) < 1e-20 {
            break;
        }
    }
    Ok(path)
}

fn intercept_fit(coef: Array1<f64>, x_mean: &Array1<f64>, y_mean: f64) -> LinearFit {
    let intercept = y_mean - coef.dot(x_mean);
    LinearFit {
        coefficients: coef,
        intercept,
    }
}

/// Orthogonal matching pursuit with a fixed number of non-zero coefficients
/// (10% of the features, at least one, when unset)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrthogonalMatchingPursuit {
    pub n_nonzero_coefs: Option<usize>,
    fitted: Option<LinearFit>,
}

impl OrthogonalMatchingPursuit {
    pub fn with_n_nonzero_coefs(mut self, n: usize) -> Self {
        self.n_nonzero_coefs = Some(n.max(1));
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }
}

impl Estimator for OrthogonalMatchingPursuit {
    fn name(&self) -> &'static str {
        "OrthogonalMatchingPursuit"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let steps = self
            .n_nonzero_coefs
            .unwrap_or_else(|| (x.ncols() / 10).max(1));
        let (x_mean, xc) = center_columns(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let path = omp_path(&xc, &(y - y_mean), steps)?;
        let coef = path.last().cloned().unwrap_or_else(|| Array1::zeros(x.ncols()));
        self.fitted = Some(intercept_fit(coef, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

/// Orthogonal matching pursuit whose sparsity is chosen by k-fold
/// cross-validated squared error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrthogonalMatchingPursuitCV {
    pub cv_folds: usize,
    fitted: Option<LinearFit>,
    n_nonzero_coefs: usize,
}

impl Default for OrthogonalMatchingPursuitCV {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            fitted: None,
            n_nonzero_coefs: 0,
        }
    }
}

impl OrthogonalMatchingPursuitCV {
    /// Sparsity selected at fit time
    pub fn n_nonzero_coefs(&self) -> usize {
        self.n_nonzero_coefs
    }
}

impl Estimator for OrthogonalMatchingPursuitCV {
    fn name(&self) -> &'static str {
        "OrthogonalMatchingPursuitCV"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let p = x.ncols();
        let max_steps = (p / 10).max(5).min(p).max(1);
        let folds = self.cv_folds.min(x.nrows()).max(2);

        let mut errors = vec![0.0; max_steps];
        if x.nrows() >= folds {
            let splits = CrossValidator::new(CVStrategy::KFold { n_splits: folds, shuffle: false }).split(y)?;
            for split in &splits {
                let x_train = take_rows(x, &split.train_indices);
                let y_train = take_values(y, &split.train_indices);
                let x_test = take_rows(x, &split.test_indices);
                let y_test = take_values(y, &split.test_indices);

                let (x_mean, xc) = center_columns(&x_train);
                let y_mean = y_train.mean().unwrap_or(0.0);
                let path = omp_path(&xc, &(&y_train - y_mean), max_steps)?;

                for (k, error) in errors.iter_mut().enumerate() {
                    // Short paths keep their last (exact) solution
                    let coef = path
                        .get(k)
                        .or_else(|| path.last())
                        .cloned()
                        .unwrap_or_else(|| Array1::zeros(p));
                    let fit = intercept_fit(coef, &x_mean, y_mean);
                    let residual = &fit.predict(&x_test)? - &y_test;
                    *error += residual.dot(&residual) / y_test.len() as f64;
                }
            }
        }

        let best_steps = errors
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map_or(1, |(k, _)| k + 1);

        let mut omp = OrthogonalMatchingPursuit::default().with_n_nonzero_coefs(best_steps);
        omp.fit(x, y)?;
        self.fitted = omp.fitted;
        self.n_nonzero_coefs = best_steps;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

/// Partial least squares regression (NIPALS, single target) on standardised data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PLSRegression {
    pub n_components: usize,
    fitted: Option<LinearFit>,
}

impl Default for PLSRegression {
    fn default() -> Self {
        Self {
            n_components: 2,
            fitted: None,
        }
    }
}

impl Estimator for PLSRegression {
    fn name(&self) -> &'static str {
        "PLSRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        let (x_mean, xc) = center_columns(x);
        let x_std = xc
            .map_axis(Axis(0), |c| (c.dot(&c) / (n.max(2) - 1) as f64).sqrt())
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        let y_mean = y.mean().unwrap_or(0.0);
        let yc = y - y_mean;
        let y_std = {
            let s = (yc.dot(&yc) / (n.max(2) - 1) as f64).sqrt();
            if s > 0.0 { s } else { 1.0 }
        };

        let mut xk = &xc / &x_std.view().insert_axis(Axis(0));
        let mut yk = &yc / y_std;

        let n_components = self.n_components.min(p).max(1);
        let mut weights: Vec<Array1<f64>> = Vec::with_capacity(n_components);
        let mut loadings: Vec<Array1<f64>> = Vec::with_capacity(n_components);
        let mut y_loadings: Vec<f64> = Vec::with_capacity(n_components);

        for _ in 0..n_components {
            let w = xk.t().dot(&yk);
            let norm = w.dot(&w).sqrt();
            if norm < 1e-12 {
                break;
            }
            let w = w / norm;
            let t = xk.dot(&w);
            let tt = t.dot(&t);
            if tt < 1e-12 {
                break;
            }
            let loading = xk.t().dot(&t) / tt;
            let q = yk.dot(&t) / tt;

            xk -= &(t.view().insert_axis(Axis(1)).dot(&loading.view().insert_axis(Axis(0))));
            yk.scaled_add(-q, &t);

            weights.push(w);
            loadings.push(loading);
            y_loadings.push(q);
        }

        let k = weights.len();
        let mut coef_std = Array1::<f64>::zeros(p);
        if k > 0 {
            // B = W (PᵀW)⁻¹ q
            let mut ptw = Array2::<f64>::zeros((k, k));
            for a in 0..k {
                for b in 0..k {
                    ptw[[a, b]] = loadings[a].dot(&weights[b]);
                }
            }
            let q = Array1::from_vec(y_loadings);
            let z = gauss_solve(&ptw, &q).ok_or_else(|| {
                SelectionError::ComputationError("degenerate PLS loadings".to_string())
            })?;
            for (a, w) in weights.iter().enumerate() {
                coef_std.scaled_add(z[a], w);
            }
        }

        let coef = coef_std / &x_std * y_std;
        self.fitted = Some(intercept_fit(coef, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_problem() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 6), |(i, j)| (((i + 1) * (j + 2) * 7) % 13) as f64 - 6.0);
        let y = x.column(2).mapv(|v| 3.0 * v) + 4.0;
        (x, y)
    }

    #[test]
    fn test_omp_selects_informative_feature() {
        let (x, y) = sparse_problem();
        let mut model = OrthogonalMatchingPursuit::default();
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients().unwrap();
        assert!((coef[2] - 3.0).abs() < 1e-8);
        assert_eq!(coef.iter().filter(|c| c.abs() > 1e-12).count(), 1);
    }

    #[test]
    fn test_omp_cv_predicts_well() {
        let (x, y) = sparse_problem();
        let mut model = OrthogonalMatchingPursuitCV::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|v| v * v).mean().unwrap();
        assert!(mse < 1e-6, "mse {}", mse);
        assert!(model.n_nonzero_coefs() >= 1);
    }

    #[test]
    fn test_pls_on_linear_target() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 5) % 7) as f64 });
        let y = x.column(0).mapv(|v| 0.5 * v) + &x.column(1).mapv(|v| 2.0 * v);
        let mut model = PLSRegression::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|v| v * v).mean().unwrap();
        // Two components span both features, so the fit is exact
        assert!(mse < 1e-8, "mse {}", mse);
    }
}
