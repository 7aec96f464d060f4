//! Online linear learners: perceptron and passive-aggressive updates

use super::{argmax, check_fit_input, check_predict_input, class_labels, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Per-sample update rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum UpdateRule {
    /// Unit step on every mistake
    Perceptron,
    /// PA-I hinge update with aggressiveness cap `c`
    PassiveAggressiveHinge { c: f64 },
    /// PA-I epsilon-insensitive update for regression
    PassiveAggressiveEpsilon { c: f64, epsilon: f64 },
}

impl UpdateRule {
    /// Signed step size for one sample, or `None` when no update is needed.
    /// Also returns the sample loss used for the stopping criterion.
    fn step(&self, target: f64, score: f64, sq_norm: f64) -> (Option<f64>, f64) {
        match *self {
            UpdateRule::Perceptron => {
                let margin = target * score;
                if margin <= 0.0 {
                    (Some(target), -margin)
                } else {
                    (None, 0.0)
                }
            }
            UpdateRule::PassiveAggressiveHinge { c } => {
                let loss = (1.0 - target * score).max(0.0);
                if loss > 0.0 {
                    (Some(target * c.min(loss / sq_norm)), loss)
                } else {
                    (None, 0.0)
                }
            }
            UpdateRule::PassiveAggressiveEpsilon { c, epsilon } => {
                let error = target - score;
                let loss = (error.abs() - epsilon).max(0.0);
                if loss > 0.0 {
                    (Some(error.signum() * c.min(loss / sq_norm)), loss)
                } else {
                    (None, 0.0)
                }
            }
        }
    }
}

/// Stopping schedule shared by the online learners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineSchedule {
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub random_state: Option<u64>,
}

impl Default for OnlineSchedule {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-3,
            n_iter_no_change: 5,
            random_state: None,
        }
    }
}

/// Run shuffled epochs of `rule` on one target vector; returns (weights, bias)
fn train_linear(
    x: &Array2<f64>,
    targets: &Array1<f64>,
    rule: UpdateRule,
    schedule: &OnlineSchedule,
) -> (Array1<f64>, f64) {
    let (n, p) = x.dim();
    let mut weights = Array1::<f64>::zeros(p);
    let mut bias = 0.0;
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = match schedule.random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let sq_norms: Vec<f64> = x.axis_iter(Axis(0)).map(|r| r.dot(&r) + 1.0).collect();

    let mut best_loss = f64::INFINITY;
    let mut stale_epochs = 0;
    for _ in 0..schedule.max_iter {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0;
        for &i in &order {
            let row = x.row(i);
            let score = row.dot(&weights) + bias;
            let (step, loss) = rule.step(targets[i], score, sq_norms[i]);
            epoch_loss += loss;
            if let Some(step) = step {
                weights.scaled_add(step, &row);
                bias += step;
            }
        }
        epoch_loss /= n as f64;

        if epoch_loss > best_loss - schedule.tol {
            stale_epochs += 1;
        } else {
            stale_epochs = 0;
        }
        best_loss = best_loss.min(epoch_loss);
        if epoch_loss == 0.0 || stale_epochs >= schedule.n_iter_no_change {
            break;
        }
    }
    (weights, bias)
}

/// One-vs-rest linear classifier built from an online update rule
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearOvR {
    /// One row per binary problem
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LinearOvR {
    fn train(x: &Array2<f64>, y: &Array1<f64>, classes: &[f64], rule: UpdateRule, schedule: &OnlineSchedule) -> Self {
        let problems: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.to_vec()
        };
        let mut weights = Array2::<f64>::zeros((problems.len(), x.ncols()));
        let mut bias = Array1::<f64>::zeros(problems.len());
        for (k, &positive) in problems.iter().enumerate() {
            let targets = y.mapv(|v| if v == positive { 1.0 } else { -1.0 });
            let (w, b) = train_linear(x, &targets, rule, schedule);
            weights.row_mut(k).assign(&w);
            bias[k] = b;
        }
        Self { weights, bias }
    }

    fn decision(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights.t()) + &self.bias.view().insert_axis(Axis(0))
    }

    fn predict(&self, x: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
        let scores = self.decision(x);
        if classes.len() == 2 {
            scores.column(0).mapv(|s| if s > 0.0 { classes[1] } else { classes[0] })
        } else {
            scores
                .axis_iter(Axis(0))
                .map(|row: ArrayView1<f64>| classes[argmax(row)])
                .collect()
        }
    }
}

/// Linear classifier fitted with online updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineClassifier {
    rule: UpdateRule,
    pub schedule: OnlineSchedule,
    model: Option<LinearOvR>,
    classes: Vec<f64>,
    n_features: usize,
}

impl OnlineClassifier {
    /// Rosenblatt perceptron
    pub fn perceptron() -> Self {
        Self::with_rule(UpdateRule::Perceptron)
    }

    /// Passive-aggressive classifier with hinge loss
    pub fn passive_aggressive(c: f64) -> Self {
        Self::with_rule(UpdateRule::PassiveAggressiveHinge { c })
    }

    fn with_rule(rule: UpdateRule) -> Self {
        Self {
            rule,
            schedule: OnlineSchedule::default(),
            model: None,
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.schedule.random_state = Some(seed);
        self
    }
}

impl Estimator for OnlineClassifier {
    fn name(&self) -> &'static str {
        match self.rule {
            UpdateRule::Perceptron => "Perceptron",
            _ => "PassiveAggressiveClassifier",
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.classes = class_labels(y);
        self.n_features = x.ncols();
        if self.classes.len() < 2 {
            self.model = Some(LinearOvR {
                weights: Array2::zeros((0, x.ncols())),
                bias: Array1::zeros(0),
            });
            return Ok(());
        }
        self.model = Some(LinearOvR::train(x, y, &self.classes, self.rule, &self.schedule));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, self.n_features)?;
        if self.classes.len() < 2 {
            return Ok(Array1::from_elem(x.nrows(), self.classes[0]));
        }
        Ok(model.predict(x, &self.classes))
    }
}

/// Passive-aggressive regressor with epsilon-insensitive loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassiveAggressiveRegressor {
    pub c: f64,
    pub epsilon: f64,
    pub schedule: OnlineSchedule,
    fitted: Option<(Array1<f64>, f64)>,
}

impl Default for PassiveAggressiveRegressor {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            schedule: OnlineSchedule::default(),
            fitted: None,
        }
    }
}

impl PassiveAggressiveRegressor {
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.schedule.random_state = Some(seed);
        self
    }
}

impl Estimator for PassiveAggressiveRegressor {
    fn name(&self) -> &'static str {
        "PassiveAggressiveRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let rule = UpdateRule::PassiveAggressiveEpsilon {
            c: self.c,
            epsilon: self.epsilon,
        };
        self.fitted = Some(train_linear(x, y, rule, &self.schedule));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (weights, bias) = self.fitted.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, weights.len())?;
        Ok(x.dot(weights) + *bias)
    }
}
