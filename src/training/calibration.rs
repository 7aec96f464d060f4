//! Sigmoid-calibrated linear SVM
//!
//! Each cross-validation fold trains a [`LinearSVC`] and fits a Platt
//! sigmoid per one-vs-rest column on the held-out decision values.
//! Predictions average the calibrated probabilities over folds.

use super::cross_validation::{CVStrategy, CrossValidator};
use super::svm::LinearSVC;
use super::{argmax, check_fit_input, class_labels, take_rows, take_values, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Platt sigmoid P(y = 1 | f) = 1 / (1 + exp(-(a·f + b)))
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattSigmoid {
    pub a: f64,
    pub b: f64,
}

impl PlattSigmoid {
    /// Fit by damped Newton iterations on Platt's smoothed targets
    pub fn fit(decision: &Array1<f64>, positive: &[bool]) -> Self {
        let n_pos = positive.iter().filter(|&&p| p).count() as f64;
        let n_neg = positive.len() as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = positive
            .iter()
            .map(|&p| if p { target_pos } else { target_neg })
            .collect();

        let loss = |a: f64, b: f64| -> f64 {
            decision
                .iter()
                .zip(targets.iter())
                .map(|(&f, &t)| {
                    let z = a * f + b;
                    // log(1 + e^z) - t·z, evaluated stably
                    let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
                    softplus - t * z
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut current = loss(a, b);

        for _ in 0..100 {
            let (mut ga, mut gb, mut haa, mut hab, mut hbb) = (0.0, 0.0, 1e-12, 0.0, 1e-12);
            for (&f, &t) in decision.iter().zip(targets.iter()) {
                let p = sigmoid(a * f + b);
                let d1 = p - t;
                let d2 = (p * (1.0 - p)).max(1e-12);
                ga += f * d1;
                gb += d1;
                haa += f * f * d2;
                hab += f * d2;
                hbb += d2;
            }
            if ga.abs() < 1e-5 && gb.abs() < 1e-5 {
                break;
            }
            let det = haa * hbb - hab * hab;
            if det.abs() < 1e-18 {
                break;
            }
            let da = (hbb * ga - hab * gb) / det;
            let db = (haa * gb - hab * ga) / det;

            let mut step = 1.0;
            let mut improved = false;
            while step > 1e-8 {
                let (na, nb) = (a - step * da, b - step * db);
                let candidate = loss(na, nb);
                if candidate < current {
                    a = na;
                    b = nb;
                    current = candidate;
                    improved = true;
                    break;
                }
                step /= 2.0;
            }
            if !improved {
                break;
            }
        }
        Self { a, b }
    }

    pub fn probability(&self, f: f64) -> f64 {
        sigmoid(self.a * f + self.b)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// One fold's base model and its per-column sigmoids
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalibratedFold {
    base: LinearSVC,
    sigmoids: Vec<PlattSigmoid>,
}

impl CalibratedFold {
    fn fit(x_train: &Array2<f64>, y_train: &Array1<f64>, x_cal: &Array2<f64>, y_cal: &Array1<f64>, classes: &[f64], seed: Option<u64>) -> Result<Self> {
        let mut base = LinearSVC::default();
        if let Some(seed) = seed {
            base = base.with_random_state(seed);
        }
        base.fit(x_train, y_train)?;
        let decision = base.decision_function(x_cal)?;

        let positives: Vec<f64> = if classes.len() == 2 { vec![classes[1]] } else { classes.to_vec() };
        let sigmoids = positives
            .iter()
            .enumerate()
            .map(|(k, &label)| {
                let is_positive: Vec<bool> = y_cal.iter().map(|&v| v == label).collect();
                PlattSigmoid::fit(&decision.column(k).to_owned(), &is_positive)
            })
            .collect();
        Ok(Self { base, sigmoids })
    }

    /// Row-normalised class probabilities, one column per class
    fn proba(&self, x: &Array2<f64>, n_classes: usize) -> Result<Array2<f64>> {
        let decision = self.base.decision_function(x)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), n_classes));
        if n_classes == 2 {
            let p = decision.column(0).mapv(|f| self.sigmoids[0].probability(f));
            proba.column_mut(1).assign(&p);
            proba.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
            return Ok(proba);
        }
        for (k, sigmoid) in self.sigmoids.iter().enumerate() {
            let column = decision.column(k).mapv(|f| sigmoid.probability(f));
            proba.column_mut(k).assign(&column);
        }
        for mut row in proba.axis_iter_mut(Axis(0)) {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            } else {
                row.fill(1.0 / n_classes as f64);
            }
        }
        Ok(proba)
    }
}

/// LinearSVC with cross-validated sigmoid calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedClassifierCV {
    pub cv_folds: usize,
    pub random_state: Option<u64>,
    folds: Vec<CalibratedFold>,
    classes: Vec<f64>,
}

impl Default for CalibratedClassifierCV {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            random_state: None,
            folds: Vec::new(),
            classes: Vec::new(),
        }
    }
}

impl CalibratedClassifierCV {
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Averaged calibrated probabilities, one column per sorted class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.folds.is_empty() {
            return Err(SelectionError::ModelNotFitted);
        }
        let mut total = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for fold in &self.folds {
            total += &fold.proba(x, self.classes.len())?;
        }
        Ok(total / self.folds.len() as f64)
    }
}

impl Estimator for CalibratedClassifierCV {
    fn name(&self) -> &'static str {
        "CalibratedClassifierCV"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.classes = class_labels(y);
        self.folds.clear();
        if self.classes.len() < 2 {
            return Err(SelectionError::TrainingError(
                "calibration needs at least two classes".to_string(),
            ));
        }

        let smallest_class = self
            .classes
            .iter()
            .map(|&c| y.iter().filter(|&&v| v == c).count())
            .min()
            .unwrap_or(0);
        let n_splits = self.cv_folds.min(smallest_class);

        if n_splits < 2 {
            // Too few rows per class to hold any out: calibrate in-sample
            self.folds.push(CalibratedFold::fit(x, y, x, y, &self.classes, self.random_state)?);
            return Ok(());
        }

        let splits = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits, shuffle: false }).split(y)?;
        for split in &splits {
            let fold = CalibratedFold::fit(
                &take_rows(x, &split.train_indices),
                &take_values(y, &split.train_indices),
                &take_rows(x, &split.test_indices),
                &take_values(y, &split.test_indices),
                &self.classes,
                self.random_state,
            )?;
            self.folds.push(fold);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| self.classes[argmax(row)])
            .collect())
    }
}
