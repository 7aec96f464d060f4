//! Dataset descriptors used to predict which candidate models will do well
//!
//! Extraction runs in two phases. [`MetaFeatureExtractor::extract_initial`]
//! looks at the raw dataset; [`MetaFeatureExtractor::extract_preprocessed`]
//! looks at the encoded numeric matrix and runs the landmark baselines.
//! Degenerate inputs produce NaN entries instead of errors.

mod extractor;
pub mod landmarks;
pub mod stats;

pub use extractor::MetaFeatureExtractor;
pub use landmarks::{Landmark, LANDMARK_COUNT};

use crate::config::ProblemClass;
use serde::{Deserialize, Serialize};

/// Initial-phase keys shared by both problem classes
pub const COMMON_INITIAL_KEYS: [&str; 7] = [
    "NExamples",
    "NFeatures",
    "NNumerical",
    "NCategorical",
    "NBinary",
    "NCompleteFeatures",
    "NCompleteExamples",
];

pub const CLASSIFICATION_KEYS: [&str; 2] = ["NClasses", "YImbalance"];
pub const REGRESSION_KEYS: [&str; 2] = ["YStd", "YImbalance"];
pub const DISTRIBUTION_KEYS: [&str; 4] = ["STDRatio", "CorrelationMean", "SkewnessMean", "KurtosisMean"];

/// Every meta-feature key in schema order
pub fn schema_keys(problem: ProblemClass) -> Vec<String> {
    let target_keys = match problem {
        ProblemClass::Classification => CLASSIFICATION_KEYS,
        ProblemClass::Regression => REGRESSION_KEYS,
    };
    let mut keys: Vec<String> = COMMON_INITIAL_KEYS
        .iter()
        .chain(target_keys.iter())
        .chain(DISTRIBUTION_KEYS.iter())
        .map(|k| k.to_string())
        .collect();
    for i in 0..LANDMARK_COUNT {
        keys.push(landmark_score_key(i));
        keys.push(landmark_time_key(i));
    }
    keys
}

pub fn landmark_score_key(index: usize) -> String {
    format!("LandmarkScore{}", index)
}

pub fn landmark_time_key(index: usize) -> String {
    format!("LandmarkTime{}", index)
}

/// Insertion-ordered meta-feature vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaFeatures {
    entries: Vec<(String, f64)>,
}

impl MetaFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place or appending
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values for `keys` in the given order; absent keys read as NaN
    pub fn values_for(&self, keys: &[String]) -> Vec<f64> {
        keys.iter().map(|k| self.get(k).unwrap_or(f64::NAN)).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
