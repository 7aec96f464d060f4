//! Selection configuration

use crate::error::{Result, SelectionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Class of the learning problem. Fixed for the lifetime of every component
/// built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemClass {
    /// Predict a discrete label
    Classification,
    /// Predict a continuous value
    Regression,
}

impl ProblemClass {
    /// Lowercase name used in paths and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemClass::Classification => "classification",
            ProblemClass::Regression => "regression",
        }
    }

    /// Directory holding this problem class's meta-model artifacts
    pub fn meta_model_dir_name(&self) -> &'static str {
        match self {
            ProblemClass::Classification => "classification_meta_models",
            ProblemClass::Regression => "regression_meta_models",
        }
    }
}

impl fmt::Display for ProblemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemClass {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "classification" | "classifier" => Ok(ProblemClass::Classification),
            "regression" | "regressor" => Ok(ProblemClass::Regression),
            other => Err(SelectionError::UnsupportedProblemClass(other.to_string())),
        }
    }
}

/// Configuration for meta-feature extraction and candidate evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Problem class
    pub problem_class: ProblemClass,

    /// Wall-clock budget for candidate evaluation in seconds (0 = no limit)
    pub time_limit_secs: f64,

    /// Fraction of accuracy accepted to lose for a 10x speed-up
    pub trade_rate: f64,

    /// Folds used when evaluating candidates
    pub cv_folds: usize,

    /// Folds used when scoring landmark baselines
    pub landmark_folds: usize,

    /// Maximum rows sampled for landmark baselines
    pub landmark_sample_size: usize,

    /// Base directory of the meta-model artifact store
    pub meta_model_dir: Option<PathBuf>,

    /// Random seed for reproducibility
    pub random_state: Option<u64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            problem_class: ProblemClass::Regression,
            time_limit_secs: 0.0,
            trade_rate: 0.05,
            cv_folds: 3,
            landmark_folds: 5,
            landmark_sample_size: 500,
            meta_model_dir: None,
            random_state: None,
        }
    }
}

impl SelectorConfig {
    /// Create a new config for the given problem class
    pub fn new(problem_class: ProblemClass) -> Self {
        Self {
            problem_class,
            ..Default::default()
        }
    }

    /// Set the evaluation time limit in seconds
    pub fn with_time_limit_secs(mut self, secs: f64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    /// Set the accuracy/speed trade rate
    pub fn with_trade_rate(mut self, rate: f64) -> Self {
        self.trade_rate = rate;
        self
    }

    /// Set the number of evaluation folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Set the landmark sample cap
    pub fn with_landmark_sample_size(mut self, size: usize) -> Self {
        self.landmark_sample_size = size;
        self
    }

    /// Set the meta-model store location
    pub fn with_meta_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.meta_model_dir = Some(dir.into());
        self
    }

    /// Set random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Evaluation budget, `None` when unbounded
    pub fn time_limit(&self) -> Result<Option<Duration>> {
        if self.time_limit_secs == 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f64(self.time_limit_secs)
            .map(Some)
            .map_err(|_| invalid("time_limit_secs", self.time_limit_secs, "must be a representable duration"))
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !self.time_limit_secs.is_finite() || self.time_limit_secs < 0.0 {
            return Err(invalid("time_limit_secs", self.time_limit_secs, "must be a non-negative number"));
        }
        self.time_limit()?;
        if !(0.0..1.0).contains(&self.trade_rate) {
            return Err(invalid("trade_rate", self.trade_rate, "must be in [0, 1)"));
        }
        if self.cv_folds < 2 {
            return Err(invalid("cv_folds", self.cv_folds, "must be at least 2"));
        }
        if self.landmark_folds < 2 {
            return Err(invalid("landmark_folds", self.landmark_folds, "must be at least 2"));
        }
        if self.landmark_sample_size < self.landmark_folds {
            return Err(invalid(
                "landmark_sample_size",
                self.landmark_sample_size,
                "must be at least landmark_folds",
            ));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> SelectionError {
    SelectionError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_class_parse() {
        assert_eq!("Classification".parse::<ProblemClass>().unwrap(), ProblemClass::Classification);
        assert_eq!("regression".parse::<ProblemClass>().unwrap(), ProblemClass::Regression);

        let err = "clustering".parse::<ProblemClass>().unwrap_err();
        assert!(matches!(err, SelectionError::UnsupportedProblemClass(_)));
    }

    #[test]
    fn test_time_limit() {
        let config = SelectorConfig::new(ProblemClass::Classification);
        assert!(config.time_limit().unwrap().is_none());

        let config = config.with_time_limit_secs(2.5);
        assert_eq!(config.time_limit().unwrap(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_unrepresentable_time_limit_is_an_error() {
        for secs in [f64::INFINITY, f64::NAN, -1.0, 1e300] {
            let config = SelectorConfig::new(ProblemClass::Regression).with_time_limit_secs(secs);
            assert!(matches!(config.time_limit(), Err(SelectionError::InvalidParameter { .. })), "{}", secs);
            assert!(config.validate().is_err(), "{}", secs);
        }
    }

    #[test]
    fn test_validate_rejects_bad_trade_rate() {
        let config = SelectorConfig::default().with_trade_rate(1.5);
        assert!(config.validate().is_err());

        let config = SelectorConfig::default().with_cv_folds(1);
        assert!(config.validate().is_err());

        assert!(SelectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SelectorConfig::new(ProblemClass::Classification)
            .with_time_limit_secs(30.0)
            .with_random_state(7);
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = SelectorConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.problem_class, ProblemClass::Classification);
        assert_eq!(loaded.time_limit_secs, 30.0);
        assert_eq!(loaded.random_state, Some(7));
    }
}
