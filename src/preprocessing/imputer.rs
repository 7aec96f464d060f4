//! Fill values for missing entries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for filling missing values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Column mean (numeric only)
    Mean,
    /// Most frequent value; ties go to the smallest value
    MostFrequent,
}

/// Mean of the non-missing entries; 0 when every entry is missing
pub fn mean_fill(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Most frequent non-missing category, if any
pub fn most_frequent(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_skips_nan() {
        assert_eq!(mean_fill(&[1.0, f64::NAN, 3.0]), 2.0);
        assert_eq!(mean_fill(&[f64::NAN]), 0.0);
    }

    #[test]
    fn test_most_frequent_tie_takes_smallest() {
        let values = vec![Some("b".to_string()), Some("a".to_string()), None, None, None];
        assert_eq!(most_frequent(&values), Some("a".to_string()));
    }
}
