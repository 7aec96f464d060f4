//! Multi-layer perceptron classifier
//!
//! One ReLU hidden layer, softmax output, cross-entropy loss with an L2
//! penalty, trained by mini-batch Adam.

use super::boosting::softmax_rows;
use super::{argmax, check_fit_input, check_predict_input, class_labels, encode_classes, take_rows, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// MLP hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Adam step size
    pub learning_rate: f64,
    /// Number of epochs
    pub max_iter: usize,
    /// Mini-batch size, capped at the number of rows
    pub batch_size: usize,
    /// L2 penalty
    pub alpha: f64,
    /// Stop when the epoch loss improves by less than this for
    /// `n_iter_no_change` consecutive epochs
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub random_state: Option<u64>,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            learning_rate: 1e-3,
            max_iter: 200,
            batch_size: 200,
            alpha: 1e-4,
            tol: 1e-4,
            n_iter_no_change: 10,
            random_state: None,
        }
    }
}

/// Adam moment estimates for one parameter tensor
#[derive(Debug, Clone)]
struct AdamState<D: ndarray::Dimension> {
    m: ndarray::Array<f64, D>,
    v: ndarray::Array<f64, D>,
}

impl<D: ndarray::Dimension> AdamState<D> {
    fn new(shape: D) -> Self {
        Self {
            m: ndarray::Array::zeros(shape.clone()),
            v: ndarray::Array::zeros(shape),
        }
    }

    fn step(&mut self, param: &mut ndarray::Array<f64, D>, grad: &ndarray::Array<f64, D>, lr: f64, t: i32) {
        const BETA1: f64 = 0.9;
        const BETA2: f64 = 0.999;
        const EPS: f64 = 1e-8;
        self.m.zip_mut_with(grad, |m, &g| *m = BETA1 * *m + (1.0 - BETA1) * g);
        self.v.zip_mut_with(grad, |v, &g| *v = BETA2 * *v + (1.0 - BETA2) * g * g);
        let lr_t = lr * (1.0 - BETA2.powi(t)).sqrt() / (1.0 - BETA1.powi(t));
        ndarray::Zip::from(param)
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + EPS));
    }
}

/// Multi-layer perceptron classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    pub config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for MLPClassifier {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    /// Glorot-uniform initialisation
    fn initialize_weights(&mut self, n_outputs: usize, rng: &mut ChaCha8Rng) {
        self.weights.clear();
        self.biases.clear();
        let mut sizes = vec![self.n_features];
        sizes.extend(&self.config.hidden_layers);
        sizes.push(n_outputs);

        for pair in sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let bound = (6.0 / (n_in + n_out) as f64).sqrt();
            self.weights
                .push(Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound)));
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Layer activations, input first, softmax output last
    fn forward(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = vec![x.clone()];
        let last = self.weights.len() - 1;
        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + &b.view().insert_axis(Axis(0));
            let a = if i < last { z.mapv(|v| v.max(0.0)) } else { softmax_rows(&z) };
            activations.push(a);
        }
        activations
    }

    /// Gradients for one batch; returns (weight grads, bias grads, loss)
    fn backward(&self, activations: &[Array2<f64>], targets: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array1<f64>>, f64) {
        let n = targets.nrows() as f64;
        let output = &activations[activations.len() - 1];
        let mut loss = -(output.mapv(|p| p.max(1e-12).ln()) * targets).sum() / n;
        loss += 0.5 * self.config.alpha * self.weights.iter().map(|w| w.mapv(|v| v * v).sum()).sum::<f64>() / n;

        let mut grad_w = Vec::with_capacity(self.weights.len());
        let mut grad_b = Vec::with_capacity(self.weights.len());
        let mut delta = (output - targets) / n;
        for i in (0..self.weights.len()).rev() {
            let gw = activations[i].t().dot(&delta) + &(&self.weights[i] * (self.config.alpha / n));
            grad_w.push(gw);
            grad_b.push(delta.sum_axis(Axis(0)));
            if i > 0 {
                let relu_mask = activations[i].mapv(|a| if a > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.weights[i].t()) * relu_mask;
            }
        }
        grad_w.reverse();
        grad_b.reverse();
        (grad_w, grad_b, loss)
    }

    /// Class probabilities, one column per sorted class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.weights.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        let mut activations = self.forward(x);
        activations.pop().ok_or(SelectionError::ModelNotFitted)
    }
}

impl Estimator for MLPClassifier {
    fn name(&self) -> &'static str {
        "MLPClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = class_labels(y);
        let n_classes = self.classes.len().max(2);

        let mut targets = Array2::<f64>::zeros((n_samples, n_classes));
        for (i, k) in encode_classes(&self.classes, y).into_iter().enumerate() {
            targets[[i, k]] = 1.0;
        }

        let mut rng = match self.config.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.initialize_weights(n_classes, &mut rng);

        let mut adam_w: Vec<AdamState<ndarray::Ix2>> = self.weights.iter().map(|w| AdamState::new(w.raw_dim())).collect();
        let mut adam_b: Vec<AdamState<ndarray::Ix1>> = self.biases.iter().map(|b| AdamState::new(b.raw_dim())).collect();

        let batch_size = self.config.batch_size.min(n_samples).max(1);
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0;
        let mut t = 0;

        for _ in 0..self.config.max_iter {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for batch in indices.chunks(batch_size) {
                let x_batch = take_rows(x, batch);
                let y_batch = take_rows(&targets, batch);
                let activations = self.forward(&x_batch);
                let (grad_w, grad_b, loss) = self.backward(&activations, &y_batch);
                epoch_loss += loss * batch.len() as f64;

                t += 1;
                for (i, (gw, gb)) in grad_w.iter().zip(grad_b.iter()).enumerate() {
                    adam_w[i].step(&mut self.weights[i], gw, self.config.learning_rate, t);
                    adam_b[i].step(&mut self.biases[i], gb, self.config.learning_rate, t);
                }
            }
            epoch_loss /= n_samples as f64;
            if !epoch_loss.is_finite() {
                return Err(SelectionError::TrainingError("MLP loss diverged".to_string()));
            }

            if epoch_loss > best_loss - self.config.tol {
                stale_epochs += 1;
            } else {
                stale_epochs = 0;
            }
            best_loss = best_loss.min(epoch_loss);
            if stale_epochs >= self.config.n_iter_no_change {
                break;
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| self.classes[argmax(row).min(self.classes.len() - 1)])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_moons_lite() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| {
            let shift = if i % 2 == 0 { -1.5 } else { 1.5 };
            shift + ((i * 7 + j * 3) % 11) as f64 * 0.05
        });
        let y = Array1::from_shape_fn(60, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_mlp_learns_separable_classes() {
        let (x, y) = two_moons_lite();
        let mut model = MLPClassifier::default().with_random_state(7);
        model.fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 54, "only {} correct", correct);
    }

    #[test]
    fn test_mlp_probabilities_sum_to_one() {
        let (x, y) = two_moons_lite();
        let mut model = MLPClassifier::default().with_random_state(1);
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mlp_seed_is_reproducible() {
        let (x, y) = two_moons_lite();
        let mut a = MLPClassifier::default().with_random_state(3);
        let mut b = MLPClassifier::default().with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }
}
