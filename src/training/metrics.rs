//! Scoring functions. Every scorer is oriented so that higher is better.

use crate::config::ProblemClass;
use crate::error::{Result, SelectionError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Fold scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scorer {
    /// Fraction of exactly matching labels
    Accuracy,
    /// Negated mean squared error
    NegMeanSquaredError,
    /// Coefficient of determination
    R2,
}

impl Scorer {
    /// Scorer used to evaluate candidates
    pub fn for_candidates(problem: ProblemClass) -> Self {
        match problem {
            ProblemClass::Classification => Scorer::Accuracy,
            ProblemClass::Regression => Scorer::NegMeanSquaredError,
        }
    }

    /// Scorer used for landmark baselines
    pub fn for_landmarks(problem: ProblemClass) -> Self {
        match problem {
            ProblemClass::Classification => Scorer::Accuracy,
            ProblemClass::Regression => Scorer::R2,
        }
    }

    /// Score predictions against the truth
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(SelectionError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(SelectionError::ValidationError("cannot score an empty fold".to_string()));
        }
        Ok(match self {
            Scorer::Accuracy => accuracy(y_true, y_pred),
            Scorer::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
            Scorer::R2 => r2_score(y_true, y_pred),
        })
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// R², with a constant truth scoring 1.0 on a perfect fit and 0.0 otherwise
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let score = Scorer::Accuracy
            .score(&array![0.0, 1.0, 1.0, 0.0], &array![0.0, 1.0, 0.0, 0.0])
            .unwrap();
        assert!((score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_neg_mse_is_non_positive() {
        let score = Scorer::NegMeanSquaredError
            .score(&array![1.0, 2.0], &array![2.0, 2.0])
            .unwrap();
        assert!((score + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0];
        assert!((r2_score(&y, &y) - 1.0).abs() < 1e-12);
        assert!(r2_score(&y, &array![2.0, 2.0, 2.0]).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(Scorer::R2.score(&array![1.0], &array![1.0, 2.0]).is_err());
    }
}
