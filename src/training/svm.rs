//! Support vector machines
//!
//! Kernel classification uses simplified SMO, one-vs-rest. Linear
//! classification and all regressors use dual coordinate descent with the
//! bias folded into the kernel (`K + 1`), which removes the equality
//! constraint of the standard dual.

use super::{argmax, check_fit_input, check_predict_input, class_labels, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Rows beyond which the dense kernel matrix is refused
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = exp(-γ ||x - y||²); `None` resolves to 1 / (n_features · Var(X))
    Rbf { gamma: Option<f64> },
}

impl KernelType {
    fn resolve(&self, x: &Array2<f64>) -> Self {
        match self {
            KernelType::Rbf { gamma: None } => {
                let var = x.var(0.0);
                let gamma = if var > 0.0 { 1.0 / (x.ncols() as f64 * var) } else { 1.0 };
                KernelType::Rbf { gamma: Some(gamma) }
            }
            other => *other,
        }
    }

    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum();
                (-gamma.unwrap_or(1.0) * sq).exp()
            }
        }
    }

    fn matrix(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let mut k = Array2::<f64>::zeros((a.nrows(), b.nrows()));
        for (i, row_a) in a.axis_iter(Axis(0)).enumerate() {
            for (j, row_b) in b.axis_iter(Axis(0)).enumerate() {
                k[[i, j]] = self.eval(row_a, row_b);
            }
        }
        k
    }
}

fn guard_kernel_size(n: usize) -> Result<()> {
    if n > MAX_KERNEL_MATRIX_SAMPLES {
        return Err(SelectionError::TrainingError(format!(
            "{} rows exceed the {} row limit for a dense kernel matrix",
            n, MAX_KERNEL_MATRIX_SAMPLES
        )));
    }
    Ok(())
}

fn seeded_rng(random_state: Option<u64>) -> ChaCha8Rng {
    match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Binary kernel machine: f(x) = Σ αᵢ yᵢ K(xᵢ, x) + b
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySvm {
    coef: Array1<f64>,
    bias: f64,
}

/// Simplified SMO on a precomputed kernel with ±1 targets
fn smo_train(kernel: &Array2<f64>, y: &Array1<f64>, c: f64, tol: f64, max_iter: usize, rng: &mut ChaCha8Rng) -> BinarySvm {
    let n = y.len();
    let mut alphas = Array1::<f64>::zeros(n);
    let mut bias = 0.0;

    let decision = |alphas: &Array1<f64>, bias: f64, i: usize| -> f64 {
        let mut sum = bias;
        for k in 0..n {
            if alphas[k] > 0.0 {
                sum += alphas[k] * y[k] * kernel[[k, i]];
            }
        }
        sum
    };

    let mut passes = 0;
    let mut total_iter = 0;
    while n > 1 && passes < 5 && total_iter < max_iter {
        let mut num_changed = 0;
        for i in 0..n {
            let e_i = decision(&alphas, bias, i) - y[i];
            if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                continue;
            }
            let j = loop {
                let j = rng.gen_range(0..n);
                if j != i {
                    break j;
                }
            };
            let e_j = decision(&alphas, bias, j) - y[j];
            let (alpha_i_old, alpha_j_old) = (alphas[i], alphas[j]);

            let (low, high) = if y[i] != y[j] {
                ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
            } else {
                ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
            };
            if (high - low).abs() < 1e-10 {
                continue;
            }

            let eta = 2.0 * kernel[[i, j]] - kernel[[i, i]] - kernel[[j, j]];
            if eta >= 0.0 {
                continue;
            }

            alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(low, high);
            if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                continue;
            }
            alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

            let b1 = bias
                - e_i
                - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, i]]
                - y[j] * (alphas[j] - alpha_j_old) * kernel[[i, j]];
            let b2 = bias
                - e_j
                - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, j]]
                - y[j] * (alphas[j] - alpha_j_old) * kernel[[j, j]];
            bias = if alphas[i] > 0.0 && alphas[i] < c {
                b1
            } else if alphas[j] > 0.0 && alphas[j] < c {
                b2
            } else {
                (b1 + b2) / 2.0
            };
            num_changed += 1;
        }

        total_iter += 1;
        passes = if num_changed == 0 { passes + 1 } else { 0 };
    }

    BinarySvm {
        coef: &alphas * y,
        bias,
    }
}

/// Problems solved one-vs-rest: a single problem for two classes
fn ovr_targets(y: &Array1<f64>, classes: &[f64]) -> Vec<Array1<f64>> {
    let positives: Vec<f64> = if classes.len() == 2 {
        vec![classes[1]]
    } else {
        classes.to_vec()
    };
    positives
        .into_iter()
        .map(|positive| y.mapv(|v| if v == positive { 1.0 } else { -1.0 }))
        .collect()
}

/// Turn per-problem decision values into labels
fn decide(scores: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
    if classes.len() == 2 {
        scores.column(0).mapv(|s| if s > 0.0 { classes[1] } else { classes[0] })
    } else {
        scores
            .axis_iter(Axis(0))
            .map(|row| classes[argmax(row)])
            .collect()
    }
}

/// Kernel support vector classifier (RBF by default)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVC {
    pub c: f64,
    pub kernel: KernelType,
    pub tol: f64,
    pub max_iter: usize,
    pub random_state: Option<u64>,
    resolved_kernel: KernelType,
    x_train: Option<Array2<f64>>,
    machines: Vec<BinarySvm>,
    classes: Vec<f64>,
}

impl Default for SVC {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::Rbf { gamma: None },
            tol: 1e-3,
            max_iter: 1000,
            random_state: None,
            resolved_kernel: KernelType::Rbf { gamma: None },
            x_train: None,
            machines: Vec::new(),
            classes: Vec::new(),
        }
    }
}

impl SVC {
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// One column per one-vs-rest problem
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let x_train = self.x_train.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, x_train.ncols())?;
        let kernel = self.resolved_kernel.matrix(x, x_train);
        let mut scores = Array2::<f64>::zeros((x.nrows(), self.machines.len()));
        for (k, machine) in self.machines.iter().enumerate() {
            let column = kernel.dot(&machine.coef) + machine.bias;
            scores.column_mut(k).assign(&column);
        }
        Ok(scores)
    }
}

impl Estimator for SVC {
    fn name(&self) -> &'static str {
        "SVC"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        guard_kernel_size(x.nrows())?;
        self.classes = class_labels(y);
        self.resolved_kernel = self.kernel.resolve(x);
        let kernel = self.resolved_kernel.matrix(x, x);
        let mut rng = seeded_rng(self.random_state);

        self.machines = if self.classes.len() < 2 {
            Vec::new()
        } else {
            ovr_targets(y, &self.classes)
                .iter()
                .map(|targets| smo_train(&kernel, targets, self.c, self.tol, self.max_iter, &mut rng))
                .collect()
        };
        self.x_train = Some(x.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.len() == 1 {
            return Ok(Array1::from_elem(x.nrows(), self.classes[0]));
        }
        let scores = self.decision_function(x)?;
        Ok(decide(&scores, &self.classes))
    }
}

/// Linear SVM with squared hinge loss, trained by dual coordinate descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSVC {
    pub c: f64,
    pub tol: f64,
    pub max_iter: usize,
    pub random_state: Option<u64>,
    /// One row per one-vs-rest problem; last column is the bias
    weights: Option<Array2<f64>>,
    classes: Vec<f64>,
}

impl Default for LinearSVC {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_iter: 1000,
            random_state: None,
            weights: None,
            classes: Vec::new(),
        }
    }
}

impl LinearSVC {
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn train_binary(&self, x: &Array2<f64>, targets: &Array1<f64>, rng: &mut ChaCha8Rng) -> Array1<f64> {
        let (n, p) = x.dim();
        let diag = 0.5 / self.c;
        let mut w = Array1::<f64>::zeros(p + 1);
        let mut alphas = vec![0.0f64; n];
        let q_diag: Vec<f64> = x.axis_iter(Axis(0)).map(|r| r.dot(&r) + 1.0 + diag).collect();
        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..self.max_iter {
            order.shuffle(rng);
            let mut max_pg = 0.0f64;
            for &i in &order {
                let row = x.row(i);
                let yi = targets[i];
                let margin = yi * (row.dot(&w.slice(ndarray::s![..p])) + w[p]);
                let g = margin - 1.0 + diag * alphas[i];
                let pg = if alphas[i] == 0.0 { g.min(0.0) } else { g };
                max_pg = max_pg.max(pg.abs());
                if pg.abs() > 1e-12 {
                    let old = alphas[i];
                    alphas[i] = (old - g / q_diag[i]).max(0.0);
                    let delta = (alphas[i] - old) * yi;
                    w.slice_mut(ndarray::s![..p]).scaled_add(delta, &row);
                    w[p] += delta;
                }
            }
            if max_pg < self.tol {
                break;
            }
        }
        w
    }

    /// One column per one-vs-rest problem
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.weights.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        let p = weights.ncols() - 1;
        check_predict_input(x, p)?;
        let linear = x.dot(&weights.slice(ndarray::s![.., ..p]).t());
        Ok(linear + &weights.column(p).insert_axis(Axis(0)))
    }
}

impl Estimator for LinearSVC {
    fn name(&self) -> &'static str {
        "LinearSVC"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.classes = class_labels(y);
        let mut rng = seeded_rng(self.random_state);
        let problems = if self.classes.len() < 2 {
            Vec::new()
        } else {
            ovr_targets(y, &self.classes)
        };
        let mut weights = Array2::<f64>::zeros((problems.len(), x.ncols() + 1));
        for (k, targets) in problems.iter().enumerate() {
            let w = self.train_binary(x, targets, &mut rng);
            weights.row_mut(k).assign(&w);
        }
        self.weights = Some(weights);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.len() == 1 {
            return Ok(Array1::from_elem(x.nrows(), self.classes[0]));
        }
        let scores = self.decision_function(x)?;
        Ok(decide(&scores, &self.classes))
    }
}

/// Epsilon-insensitive dual coordinate descent on `K + 1`.
/// Returns the dual coefficients βᵢ ∈ [-C, C].
fn svr_dual(kernel: &Array2<f64>, y: &Array1<f64>, c: f64, epsilon: f64, tol: f64, max_iter: usize) -> Array1<f64> {
    let n = y.len();
    let mut beta = Array1::<f64>::zeros(n);
    let mut fitted = Array1::<f64>::zeros(n);

    for _ in 0..max_iter {
        let mut max_change = 0.0f64;
        for i in 0..n {
            let q_ii = kernel[[i, i]] + 1.0;
            if q_ii <= 0.0 {
                continue;
            }
            let u = y[i] - (fitted[i] - q_ii * beta[i]);
            let shrunk = (u.abs() - epsilon).max(0.0) * u.signum() / q_ii;
            let new_beta = shrunk.clamp(-c, c);
            let delta = new_beta - beta[i];
            if delta != 0.0 {
                for k in 0..n {
                    fitted[k] += delta * (kernel[[k, i]] + 1.0);
                }
                beta[i] = new_beta;
                max_change = max_change.max(delta.abs());
            }
        }
        if max_change < tol {
            break;
        }
    }
    beta
}

/// Which support vector regressor to fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SvrVariant {
    /// Fixed tube width `epsilon`
    Epsilon { epsilon: f64 },
    /// Tube width chosen so that about a fraction `nu` of rows fall outside it
    Nu { nu: f64 },
}

/// Support vector regressor over an RBF or linear kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorRegressor {
    pub c: f64,
    pub kernel: KernelType,
    pub variant: SvrVariant,
    pub tol: f64,
    pub max_iter: usize,
    resolved_kernel: KernelType,
    x_train: Option<Array2<f64>>,
    beta: Array1<f64>,
}

impl SupportVectorRegressor {
    fn build(kernel: KernelType, variant: SvrVariant) -> Self {
        Self {
            c: 1.0,
            kernel,
            variant,
            tol: 1e-4,
            max_iter: 1000,
            resolved_kernel: kernel,
            x_train: None,
            beta: Array1::zeros(0),
        }
    }

    /// RBF epsilon-SVR with epsilon = 0.1
    pub fn svr() -> Self {
        Self::build(KernelType::Rbf { gamma: None }, SvrVariant::Epsilon { epsilon: 0.1 })
    }

    /// RBF nu-SVR with nu = 0.5
    pub fn nu_svr() -> Self {
        Self::build(KernelType::Rbf { gamma: None }, SvrVariant::Nu { nu: 0.5 })
    }

    /// Linear epsilon-SVR with epsilon = 0
    pub fn linear_svr() -> Self {
        Self::build(KernelType::Linear, SvrVariant::Epsilon { epsilon: 0.0 })
    }
}

impl Estimator for SupportVectorRegressor {
    fn name(&self) -> &'static str {
        match (self.kernel, self.variant) {
            (KernelType::Linear, _) => "LinearSVR",
            (_, SvrVariant::Nu { .. }) => "NuSVR",
            _ => "SVR",
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        guard_kernel_size(x.nrows())?;
        self.resolved_kernel = self.kernel.resolve(x);
        let kernel = self.resolved_kernel.matrix(x, x);

        self.beta = match self.variant {
            SvrVariant::Epsilon { epsilon } => svr_dual(&kernel, y, self.c, epsilon, self.tol, self.max_iter),
            SvrVariant::Nu { nu } => {
                if !(0.0..=1.0).contains(&nu) || nu == 0.0 {
                    return Err(SelectionError::InvalidParameter {
                        name: "nu".to_string(),
                        value: nu.to_string(),
                        reason: "must be in (0, 1]".to_string(),
                    });
                }
                // Fit without a tube, then widen it to the (1 - nu) residual quantile
                let initial = svr_dual(&kernel, y, self.c, 0.0, self.tol, self.max_iter);
                let fitted = kernel.dot(&initial) + initial.sum();
                let mut residuals: Vec<f64> = (y - &fitted).iter().map(|r| r.abs()).collect();
                residuals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let idx = (((1.0 - nu) * residuals.len() as f64).floor() as usize).min(residuals.len() - 1);
                svr_dual(&kernel, y, self.c, residuals[idx], self.tol, self.max_iter)
            }
        };
        self.x_train = Some(x.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, x_train.ncols())?;
        let kernel = self.resolved_kernel.matrix(x, x_train);
        Ok(kernel.dot(&self.beta) + self.beta.sum())
    }
}
