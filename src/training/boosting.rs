//! Boosted tree ensembles: AdaBoost (SAMME and R2) and gradient boosting

use super::decision_tree::DecisionTree;
use super::{argmax, check_fit_input, class_index, class_labels, encode_classes, take_rows, take_values, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

fn seeded_rng(random_state: Option<u64>) -> ChaCha8Rng {
    match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Draw `n` row indices with probability proportional to `weights`
fn weighted_resample(weights: &Array1<f64>, rng: &mut ChaCha8Rng) -> Result<Vec<usize>> {
    let dist = WeightedIndex::new(weights.iter())
        .map_err(|e| SelectionError::ComputationError(format!("invalid sample weights: {}", e)))?;
    Ok((0..weights.len()).map(|_| dist.sample(rng)).collect())
}

/// Multi-class AdaBoost (SAMME) over decision stumps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTree>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            random_state: None,
            estimators: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

impl Estimator for AdaBoostClassifier {
    fn name(&self) -> &'static str {
        "AdaBoostClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        self.classes = class_labels(y);
        self.estimators.clear();
        self.alphas.clear();

        let n_classes = self.classes.len() as f64;
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        let mut rng = seeded_rng(self.random_state);

        for round in 0..self.n_estimators {
            let rows = if round == 0 {
                (0..n_samples).collect()
            } else {
                weighted_resample(&weights, &mut rng)?
            };
            let mut stump = DecisionTree::classifier().with_max_depth(1);
            stump.fit(&take_rows(x, &rows), &take_values(y, &rows))?;

            let predictions = stump.predict(x)?;
            let error: f64 = (0..n_samples)
                .filter(|&i| predictions[i] != y[i])
                .map(|i| weights[i])
                .sum();

            if error <= 0.0 {
                self.estimators.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 1.0 - 1.0 / n_classes {
                if self.estimators.is_empty() {
                    self.estimators.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes - 1.0).ln());
            for i in 0..n_samples {
                if predictions[i] != y[i] {
                    weights[i] *= alpha.exp();
                }
            }
            let total = weights.sum();
            weights /= total;

            self.estimators.push(stump);
            self.alphas.push(alpha);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        let mut votes = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (stump, &alpha) in self.estimators.iter().zip(&self.alphas) {
            let predictions = stump.predict(x)?;
            for (i, &p) in predictions.iter().enumerate() {
                votes[[i, class_index(&self.classes, p)]] += alpha;
            }
        }
        Ok(votes
            .axis_iter(Axis(0))
            .map(|row| self.classes[argmax(row)])
            .collect())
    }
}

/// AdaBoost.R2 with linear loss over depth-3 regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTree>,
    weights: Vec<f64>,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            random_state: None,
            estimators: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

impl Estimator for AdaBoostRegressor {
    fn name(&self) -> &'static str {
        "AdaBoostRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        self.estimators.clear();
        self.weights.clear();

        let mut sample_weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        let mut rng = seeded_rng(self.random_state);

        for _ in 0..self.n_estimators {
            let rows = weighted_resample(&sample_weights, &mut rng)?;
            let mut tree = DecisionTree::regressor().with_max_depth(3);
            tree.fit(&take_rows(x, &rows), &take_values(y, &rows))?;

            let predictions = tree.predict(x)?;
            let errors = (&predictions - y).mapv(f64::abs);
            let max_error = errors.fold(0.0f64, |m, &e| m.max(e));
            if max_error <= 0.0 {
                self.estimators.push(tree);
                self.weights.push(1.0);
                break;
            }

            let losses = errors / max_error;
            let avg_loss = (&losses * &sample_weights).sum();
            if avg_loss >= 0.5 {
                if self.estimators.is_empty() {
                    self.estimators.push(tree);
                    self.weights.push(1.0);
                }
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            let estimator_weight = self.learning_rate * (1.0 / beta).ln();
            for i in 0..n_samples {
                sample_weights[i] *= beta.powf((1.0 - losses[i]) * self.learning_rate);
            }
            let total = sample_weights.sum();
            sample_weights /= total;

            self.estimators.push(tree);
            self.weights.push(estimator_weight);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        let all = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        // Weighted median across estimators
        let half = 0.5 * self.weights.iter().sum::<f64>();
        Ok(Array1::from_shape_fn(x.nrows(), |i| {
            let mut pairs: Vec<(f64, f64)> = all.iter().map(|p| p[i]).zip(self.weights.iter().copied()).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            let mut cumulative = 0.0;
            for &(value, weight) in &pairs {
                cumulative += weight;
                if cumulative >= half {
                    return value;
                }
            }
            pairs.last().map_or(0.0, |p| p.0)
        }))
    }
}

/// Shared hyper-parameters of gradient boosting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
        }
    }
}

/// Least-squares gradient boosting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    init: f64,
    trees: Vec<DecisionTree>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            init: 0.0,
            trees: Vec::new(),
        }
    }
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl Estimator for GradientBoostingRegressor {
    fn name(&self) -> &'static str {
        "GradientBoostingRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.init = y.mean().unwrap_or(0.0);
        self.trees.clear();

        let mut current = Array1::from_elem(y.len(), self.init);
        for _ in 0..self.config.n_estimators {
            let residuals = y - &current;
            let mut tree = DecisionTree::regressor().with_max_depth(self.config.max_depth);
            tree.fit(x, &residuals)?;
            current.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        let mut out = Array1::from_elem(x.nrows(), self.init);
        for tree in &self.trees {
            out.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(out)
    }
}

/// Log-loss gradient boosting; one tree per stage for two classes, one per
/// class and stage otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    classes: Vec<f64>,
    init: Vec<f64>,
    stages: Vec<Vec<DecisionTree>>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            init: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn n_outputs(&self) -> usize {
        if self.classes.len() <= 2 {
            1
        } else {
            self.classes.len()
        }
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let k = self.n_outputs();
        let mut raw = Array2::<f64>::zeros((x.nrows(), k));
        for (j, &init) in self.init.iter().enumerate() {
            raw.column_mut(j).fill(init);
        }
        for stage in &self.stages {
            for (j, tree) in stage.iter().enumerate() {
                let mut column = raw.column_mut(j);
                column.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            }
        }
        Ok(raw)
    }
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Estimator for GradientBoostingClassifier {
    fn name(&self) -> &'static str {
        "GradientBoostingClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.classes = class_labels(y);
        self.stages.clear();
        let codes = encode_classes(&self.classes, y);
        let n = y.len() as f64;
        let k = self.n_outputs();

        if self.classes.len() < 2 {
            self.init = vec![0.0];
            return Ok(());
        }

        self.init = if k == 1 {
            let p = codes.iter().filter(|&&c| c == 1).count() as f64 / n;
            vec![(p / (1.0 - p)).ln()]
        } else {
            (0..k)
                .map(|j| (codes.iter().filter(|&&c| c == j).count() as f64 / n).ln())
                .collect()
        };

        let mut raw = Array2::<f64>::zeros((x.nrows(), k));
        for (j, &init) in self.init.iter().enumerate() {
            raw.column_mut(j).fill(init);
        }

        for _ in 0..self.config.n_estimators {
            let probabilities = if k == 1 {
                raw.mapv(sigmoid)
            } else {
                softmax_rows(&raw)
            };

            let mut stage = Vec::with_capacity(k);
            for j in 0..k {
                let target_code = if k == 1 { 1 } else { j };
                let residuals: Array1<f64> = codes
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| f64::from(u8::from(c == target_code)) - probabilities[[i, j]])
                    .collect();
                let mut tree = DecisionTree::regressor().with_max_depth(self.config.max_depth);
                tree.fit(x, &residuals)?;
                let mut column = raw.column_mut(j);
                column.scaled_add(self.config.learning_rate, &tree.predict(x)?);
                stage.push(tree);
            }
            self.stages.push(stage);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        if self.classes.len() == 1 {
            return Ok(Array1::from_elem(x.nrows(), self.classes[0]));
        }
        let raw = self.raw_scores(x)?;
        if self.n_outputs() == 1 {
            Ok(raw.column(0).mapv(|z| if z > 0.0 { self.classes[1] } else { self.classes[0] }))
        } else {
            Ok(raw.axis_iter(Axis(0)).map(|row| self.classes[argmax(row)]).collect())
        }
    }
}

pub(crate) fn softmax_rows(raw: &Array2<f64>) -> Array2<f64> {
    let mut out = raw.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    out
}
