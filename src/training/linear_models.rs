//! Closed-form and iteratively reweighted linear regressors

use super::linalg::{center_columns, cholesky_solve, gauss_solve, solve_normal_equations, spd_inverse};
use super::{check_fit_input, check_predict_input, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Weights and intercept of a fitted linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LinearFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Ridge fit on centred data; `alpha = 0` is ordinary least squares
    pub fn ridge(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        let (x_mean, x_centered) = center_columns(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let coefficients = solve_normal_equations(&x_centered, &(y - y_mean), alpha)?;
        let intercept = y_mean - coefficients.dot(&x_mean);
        Ok(Self {
            coefficients,
            intercept,
        })
    }
}

/// Ordinary least squares
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    fitted: Option<LinearFit>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

impl Estimator for LinearRegression {
    fn name(&self) -> &'static str {
        "LinearRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.fitted = Some(LinearFit::ridge(x, y, 0.0)?);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

/// Bayesian ridge regression with evidence maximisation of the noise and
/// weight precisions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesianRidge {
    pub max_iter: usize,
    pub tol: f64,
    /// Gamma prior shape/rate on the noise precision
    pub alpha_prior: (f64, f64),
    /// Gamma prior shape/rate on the weight precision
    pub lambda_prior: (f64, f64),
    fitted: Option<LinearFit>,
    alpha: f64,
    lambda: f64,
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_prior: (1e-6, 1e-6),
            lambda_prior: (1e-6, 1e-6),
            fitted: None,
            alpha: 1.0,
            lambda: 1.0,
        }
    }
}

impl BayesianRidge {
    /// Estimated noise precision
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Estimated weight precision
    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Estimator for BayesianRidge {
    fn name(&self) -> &'static str {
        "BayesianRidge"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        let (x_mean, xc) = center_columns(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let yc = y - y_mean;

        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);
        let y_var = yc.mapv(|v| v * v).sum() / n as f64;

        let mut alpha = 1.0 / (y_var + f64::EPSILON);
        let mut lambda = 1.0;
        let mut coef = Array1::<f64>::zeros(p);

        for _ in 0..self.max_iter {
            // Posterior precision: alpha XᵀX + lambda I
            let mut precision = &xtx * alpha;
            for i in 0..p {
                precision[[i, i]] += lambda;
            }
            let covariance = spd_inverse(&precision).ok_or_else(|| {
                SelectionError::ComputationError("posterior precision is singular".to_string())
            })?;
            let new_coef = covariance.dot(&xty) * alpha;

            let gamma = p as f64 - lambda * covariance.diag().sum();
            let residual = (&yc - &xc.dot(&new_coef)).mapv(|v| v * v).sum();
            let coef_sq = new_coef.mapv(|v| v * v).sum();

            lambda = (gamma + 2.0 * self.lambda_prior.0) / (coef_sq + 2.0 * self.lambda_prior.1);
            alpha = (n as f64 - gamma + 2.0 * self.alpha_prior.0) / (residual + 2.0 * self.alpha_prior.1);

            let change: f64 = (&new_coef - &coef).mapv(f64::abs).sum();
            coef = new_coef;
            if change < self.tol {
                break;
            }
        }

        self.alpha = alpha;
        self.lambda = lambda;
        let intercept = y_mean - coef.dot(&x_mean);
        self.fitted = Some(LinearFit {
            coefficients: coef,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

/// Huber-loss regression by iteratively reweighted least squares with a
/// robust (MAD) scale estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuberRegressor {
    pub epsilon: f64,
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    fitted: Option<LinearFit>,
}

impl Default for HuberRegressor {
    fn default() -> Self {
        Self {
            epsilon: 1.35,
            alpha: 1e-4,
            max_iter: 100,
            tol: 1e-5,
            fitted: None,
        }
    }
}

impl Estimator for HuberRegressor {
    fn name(&self) -> &'static str {
        "HuberRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();

        // Design matrix with a trailing intercept column
        let mut design = Array2::<f64>::ones((n, p + 1));
        design.slice_mut(ndarray::s![.., ..p]).assign(x);

        let mut weights = Array1::<f64>::ones(n);
        let mut beta = Array1::<f64>::zeros(p + 1);

        for _ in 0..self.max_iter {
            let weighted = &design * &weights.view().insert_axis(Axis(1));
            let mut gram = weighted.t().dot(&design);
            for i in 0..p {
                gram[[i, i]] += self.alpha;
            }
            let rhs = weighted.t().dot(y);
            let new_beta = cholesky_solve(&gram, &rhs)
                .or_else(|| gauss_solve(&gram, &rhs))
                .ok_or_else(|| SelectionError::ComputationError("singular Huber system".to_string()))?;

            let residuals = y - &design.dot(&new_beta);
            let scale = (median_abs(&residuals) / 0.6745).max(1e-10);
            for (w, r) in weights.iter_mut().zip(residuals.iter()) {
                let z = r.abs() / scale;
                *w = if z <= self.epsilon { 1.0 } else { self.epsilon / z };
            }

            let change = (&new_beta - &beta).mapv(f64::abs).fold(0.0f64, |m, &v| m.max(v));
            beta = new_beta;
            if change < self.tol {
                break;
            }
        }

        self.fitted = Some(LinearFit {
            coefficients: beta.slice(ndarray::s![..p]).to_owned(),
            intercept: beta[p],
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?.predict(x)
    }
}

fn median_abs(values: &Array1<f64>) -> f64 {
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    abs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let m = abs.len();
    if m == 0 {
        0.0
    } else if m % 2 == 1 {
        abs[m / 2]
    } else {
        (abs[m / 2 - 1] + abs[m / 2]) / 2.0
    }
}

/// Kernel ridge regression with a linear kernel, solved in the dual
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelRidge {
    pub alpha: f64,
    x_train: Option<Array2<f64>>,
    dual_coef: Option<Array1<f64>>,
}

impl Default for KernelRidge {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            x_train: None,
            dual_coef: None,
        }
    }
}

impl Estimator for KernelRidge {
    fn name(&self) -> &'static str {
        "KernelRidge"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let mut gram = x.dot(&x.t());
        for i in 0..gram.nrows() {
            gram[[i, i]] += self.alpha;
        }
        let dual = cholesky_solve(&gram, y)
            .ok_or_else(|| SelectionError::ComputationError("kernel matrix is singular".to_string()))?;
        self.x_train = Some(x.clone());
        self.dual_coef = Some(dual);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, dual) = match (&self.x_train, &self.dual_coef) {
            (Some(x_train), Some(dual)) => (x_train, dual),
            _ => return Err(SelectionError::ModelNotFitted),
        };
        check_predict_input(x, x_train.ncols())?;
        Ok(x.dot(&x_train.t()).dot(dual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0, 0.5], [2.0, 1.0], [3.0, 0.0], [4.0, 2.0], [5.0, 1.5], [6.0, 0.2]];
        let y = x.column(0).mapv(|v| 2.0 * v) + &x.column(1).mapv(|v| -1.0 * v) + 1.0;
        (x, y)
    }

    #[test]
    fn test_linear_regression_recovers_coefficients() {
        let (x, y) = line();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-8);
        assert!((coef[1] + 1.0).abs() < 1e-8);
        assert!((model.intercept().unwrap() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_bayesian_ridge_close_to_ols() {
        let (x, y) = line();
        let mut model = BayesianRidge::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|v| v * v).mean().unwrap();
        assert!(mse < 1e-2, "mse {}", mse);
    }

    #[test]
    fn test_huber_resists_outlier() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let mut y = x.column(0).mapv(|v| 3.0 * v);
        y[19] = 500.0;
        let mut model = HuberRegressor::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[10.0]]).unwrap();
        assert!((pred[0] - 30.0).abs() < 3.0, "prediction {}", pred[0]);
    }

    #[test]
    fn test_kernel_ridge_shrinks_towards_zero() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        let mut model = KernelRidge::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[2.0]]).unwrap();
        // Equivalent primal ridge: w = 28 / (14 + 1)
        assert!((pred[0] - 2.0 * 28.0 / 15.0).abs() < 1e-9);
    }
}
