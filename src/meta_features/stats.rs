//! Descriptive statistics behind the meta-features
//!
//! Every function returns NaN rather than failing when the statistic is
//! undefined for its input.

use ndarray::{Array2, ArrayView1, Axis};
use std::collections::BTreeMap;

fn is_flat(m2: f64, mean: f64) -> bool {
    m2 <= 1e-14 * (1.0 + mean * mean)
}

/// Sample (n - 1) standard deviation
pub fn sample_std(values: ArrayView1<f64>) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.sum() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Mean of the non-NaN values; NaN when there are none
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Geometric mean of the per-column standard deviations that are positive
pub fn std_ratio(x: &Array2<f64>) -> f64 {
    let logs: Vec<f64> = x
        .axis_iter(Axis(1))
        .map(sample_std)
        .filter(|s| *s > 0.0)
        .map(f64::ln)
        .collect();
    if logs.is_empty() {
        return f64::NAN;
    }
    (logs.iter().sum::<f64>() / logs.len() as f64).exp()
}

/// Mean absolute Pearson correlation over the full matrix, diagonal included
pub fn correlation_mean(x: &Array2<f64>) -> f64 {
    let (n, p) = x.dim();
    if n < 2 || p == 0 {
        return f64::NAN;
    }
    let means = match x.mean_axis(Axis(0)) {
        Some(m) => m,
        None => return f64::NAN,
    };
    let centred = x - &means.view().insert_axis(Axis(0));
    let norms: Vec<f64> = centred.axis_iter(Axis(1)).map(|c| c.dot(&c).sqrt()).collect();
    if norms.iter().zip(means.iter()).any(|(&norm, &mean)| is_flat(norm * norm / n as f64, mean)) {
        return f64::NAN;
    }
    let gram = centred.t().dot(&centred);
    let mut total = 0.0;
    for a in 0..p {
        for b in 0..p {
            let r = (gram[[a, b]] / (norms[a] * norms[b])).clamp(-1.0, 1.0);
            total += r.abs();
        }
    }
    total / (p * p) as f64
}

/// Population central moments (mean, m2, m3, m4)
fn moments(values: ArrayView1<f64>) -> (f64, f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.sum() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (mean, m2 / n, m3 / n, m4 / n)
}

/// Bias-corrected sample skewness (G1); 0 for a constant column, NaN below
/// three rows
pub fn skewness(values: ArrayView1<f64>) -> f64 {
    let n = values.len();
    if n < 3 {
        return f64::NAN;
    }
    let (mean, m2, m3, _) = moments(values);
    if is_flat(m2, mean) {
        return 0.0;
    }
    let n = n as f64;
    (n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5)
}

/// Bias-corrected sample excess kurtosis (G2); 0 for a constant column, NaN
/// below four rows
pub fn kurtosis(values: ArrayView1<f64>) -> f64 {
    let n = values.len();
    if n < 4 {
        return f64::NAN;
    }
    let (mean, m2, _, m4) = moments(values);
    if is_flat(m2, mean) {
        return 0.0;
    }
    let n = n as f64;
    (n - 1.0) / ((n - 2.0) * (n - 3.0)) * ((n + 1.0) * m4 / (m2 * m2) - 3.0 * (n - 1.0))
}

/// Sample standard deviation of the per-class row counts
pub fn class_imbalance(y: ArrayView1<f64>) -> f64 {
    let mut counts: BTreeMap<u64, f64> = BTreeMap::new();
    for &v in y {
        *counts.entry(v.to_bits()).or_insert(0.0) += 1.0;
    }
    let counts: Vec<f64> = counts.into_values().collect();
    sample_std(ArrayView1::from(&counts))
}

/// Number of distinct target values
pub fn class_count(y: ArrayView1<f64>) -> usize {
    let mut distinct: Vec<u64> = y.iter().map(|v| v.to_bits()).collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len()
}

/// Sample standard deviation of the non-empty bin counts of a 10-bin
/// equal-width histogram of `y`
pub fn histogram_imbalance(y: ArrayView1<f64>) -> f64 {
    const BINS: usize = 10;
    if y.is_empty() || y.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    let mut low = y.fold(f64::INFINITY, |m, &v| m.min(v));
    let mut high = y.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    if low == high {
        let pad = if low == 0.0 { 1e-3 } else { 1e-3 * low.abs() };
        low -= pad;
        high += pad;
    }
    let width = (high - low) / BINS as f64;
    let mut counts = [0.0f64; BINS];
    for &v in y {
        // Bins are closed on the right; the first one also holds the minimum
        let position = ((v - low) / width).ceil() as i64 - 1;
        counts[position.clamp(0, BINS as i64 - 1) as usize] += 1.0;
    }
    let non_empty: Vec<f64> = counts.into_iter().filter(|&c| c > 0.0).collect();
    sample_std(ArrayView1::from(&non_empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sample_std() {
        assert!((sample_std(array![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].view()) - 2.138089935).abs() < 1e-8);
        assert!(sample_std(array![1.0].view()).is_nan());
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let v = array![1.0, 2.0, 3.0, 4.0, 10.0];
        // Reference values from the adjusted Fisher-Pearson estimators
        assert!((skewness(v.view()) - 1.697_056_27).abs() < 1e-6);
        assert!((kurtosis(v.view()) - 3.152).abs() < 1e-9);
        assert_eq!(skewness(array![3.0, 3.0, 3.0].view()), 0.0);
        assert!(kurtosis(array![1.0, 2.0, 3.0].view()).is_nan());
    }

    #[test]
    fn test_correlation_mean() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        assert!((correlation_mean(&x) - 1.0).abs() < 1e-12);
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        assert!(correlation_mean(&x).is_nan());
    }

    #[test]
    fn test_std_ratio_skips_constant_columns() {
        let x = array![[0.0, 1.0, 7.0], [2.0, 5.0, 7.0]];
        let expected = (2f64.sqrt() * 8f64.sqrt()).sqrt();
        assert!((std_ratio(&x) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_class_imbalance() {
        assert_eq!(class_imbalance(array![0.0, 1.0, 0.0, 1.0].view()), 0.0);
        assert!(class_imbalance(array![1.0, 1.0].view()).is_nan());
        assert_eq!(class_count(array![2.0, 0.0, 2.0].view()), 2);
    }

    #[test]
    fn test_histogram_imbalance_uniform() {
        let y = ndarray::Array1::from_shape_fn(100, |i| i as f64);
        assert!(histogram_imbalance(y.view()).abs() < 1e-12);
    }
}
