//! Score normalization and the accuracy/speed trade-off

use crate::config::ProblemClass;

/// Offset keeping the worst regression candidate above zero
pub const NORMALIZATION_EPSILON: f64 = 1e-6;

/// Elapsed times are floored at one microsecond before taking ratios
const MIN_SECONDS: f64 = 1e-6;

/// Maps raw cross-validation scores onto a common higher-is-better scale
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    problem: ProblemClass,
}

impl ScoreNormalizer {
    pub fn new(problem: ProblemClass) -> Self {
        Self { problem }
    }

    /// Accuracy passes through. Negative MSE becomes
    /// `1 - rmse / max_rmse + eps`, or `1 + eps` for all when every RMSE is 0.
    pub fn normalize(&self, raw: &[f64]) -> Vec<f64> {
        match self.problem {
            ProblemClass::Classification => raw.to_vec(),
            ProblemClass::Regression => {
                let rmse: Vec<f64> = raw.iter().map(|s| (-s).max(0.0).sqrt()).collect();
                let max = rmse.iter().copied().fold(0.0, f64::max);
                rmse.iter()
                    .map(|r| {
                        if max > 0.0 {
                            1.0 - r / max + NORMALIZATION_EPSILON
                        } else {
                            1.0 + NORMALIZATION_EPSILON
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Combines normalized score and elapsed time into one rank.
///
/// `rank = score * (1 - trade_rate) ^ log10(time / fastest)`: each tenfold
/// slowdown relative to the fastest candidate costs a `trade_rate` fraction
/// of the score.
#[derive(Debug, Clone, Copy)]
pub struct RelativeLandmarkScorer {
    trade_rate: f64,
}

impl RelativeLandmarkScorer {
    pub fn new(trade_rate: f64) -> Self {
        Self { trade_rate }
    }

    pub fn trade_rate(&self) -> f64 {
        self.trade_rate
    }

    /// One rank per (score, seconds) pair, in input order
    pub fn rank(&self, scores: &[f64], seconds: &[f64]) -> Vec<f64> {
        let times: Vec<f64> = seconds.iter().map(|t| t.max(MIN_SECONDS)).collect();
        let fastest = times
            .iter()
            .copied()
            .filter(|t| t.is_finite())
            .fold(f64::INFINITY, f64::min);
        let keep = 1.0 - self.trade_rate;
        scores
            .iter()
            .zip(&times)
            .map(|(&score, &time)| score * keep.powf((time / fastest).log10()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_normalization_bounds_and_order() {
        let normalizer = ScoreNormalizer::new(ProblemClass::Regression);
        let normalized = normalizer.normalize(&[-4.0, -16.0, -1.0]);
        // RMSE 2, 4, 1
        assert!((normalized[0] - (0.5 + NORMALIZATION_EPSILON)).abs() < 1e-12);
        assert!((normalized[1] - NORMALIZATION_EPSILON).abs() < 1e-12);
        assert!((normalized[2] - (0.75 + NORMALIZATION_EPSILON)).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_rmse() {
        let normalized = ScoreNormalizer::new(ProblemClass::Regression).normalize(&[0.0, -0.0]);
        assert_eq!(normalized, vec![1.0 + NORMALIZATION_EPSILON; 2]);
    }

    #[test]
    fn test_classification_unchanged() {
        let raw = [0.5, 0.9];
        assert_eq!(ScoreNormalizer::new(ProblemClass::Classification).normalize(&raw), raw.to_vec());
        assert!(ScoreNormalizer::new(ProblemClass::Regression).normalize(&[]).is_empty());
    }

    #[test]
    fn test_slower_candidate_with_equal_score_never_ranks_higher() {
        for rate in [0.01, 0.05, 0.5] {
            let ranks = RelativeLandmarkScorer::new(rate).rank(&[0.8, 0.8, 0.8], &[0.5, 2.0, 30.0]);
            assert!(ranks[1] <= ranks[0]);
            assert!(ranks[2] <= ranks[1]);
        }
    }

    #[test]
    fn test_tenfold_slowdown_costs_trade_rate() {
        let ranks = RelativeLandmarkScorer::new(0.05).rank(&[0.90, 0.91], &[1.0, 10.0]);
        assert!((ranks[0] - 0.90).abs() < 1e-12);
        assert!((ranks[1] - 0.91 * 0.95).abs() < 1e-12);
        assert!(ranks[0] > ranks[1]);
    }

    #[test]
    fn test_zero_trade_rate_ignores_time() {
        let ranks = RelativeLandmarkScorer::new(0.0).rank(&[0.7, 0.6], &[0.0, 100.0]);
        assert_eq!(ranks, vec![0.7, 0.6]);
    }
}
