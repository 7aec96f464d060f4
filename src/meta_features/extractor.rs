use super::landmarks::LandmarkRunner;
use super::stats::{
    class_count, class_imbalance, correlation_mean, histogram_imbalance, kurtosis, nan_mean, sample_std, skewness,
    std_ratio,
};
use super::{landmark_score_key, landmark_time_key, MetaFeatures};
use crate::config::{ProblemClass, SelectorConfig};
use crate::dataset::Dataset;
use ndarray::{Array1, Array2, Axis};
use tracing::info;

/// Two-phase meta-feature extractor for one problem class
#[derive(Debug, Clone)]
pub struct MetaFeatureExtractor {
    problem: ProblemClass,
    landmarks: LandmarkRunner,
    meta_data: MetaFeatures,
}

impl MetaFeatureExtractor {
    pub fn new(problem: ProblemClass) -> Self {
        Self {
            problem,
            landmarks: LandmarkRunner::new(problem),
            meta_data: MetaFeatures::new(),
        }
    }

    /// Extractor using the landmark settings of `config`
    pub fn from_config(config: &SelectorConfig) -> Self {
        let mut extractor = Self::new(config.problem_class);
        extractor.landmarks.sample_size = config.landmark_sample_size;
        extractor.landmarks.n_folds = config.landmark_folds;
        extractor.landmarks.random_state = config.random_state;
        extractor
    }

    pub fn problem_class(&self) -> ProblemClass {
        self.problem
    }

    /// Structural descriptors of the raw dataset
    pub fn extract_initial(&mut self, data: &Dataset) {
        let columns = data.columns();
        let n_rows = data.n_rows();
        let numerical = columns.iter().filter(|c| c.is_numeric()).count();
        let binary = columns.iter().filter(|c| c.n_unique_with_missing() == 2).count();
        let complete_features = columns.iter().filter(|c| c.n_missing() == 0).count();
        let complete_examples = (0..n_rows)
            .filter(|&row| columns.iter().all(|c| !c.is_missing(row)))
            .count();

        self.meta_data.insert("NExamples", n_rows as f64);
        self.meta_data.insert("NFeatures", columns.len() as f64);
        self.meta_data.insert("NNumerical", numerical as f64);
        self.meta_data.insert("NCategorical", (columns.len() - numerical) as f64);
        self.meta_data.insert("NBinary", binary as f64);
        self.meta_data.insert("NCompleteFeatures", complete_features as f64);
        self.meta_data.insert("NCompleteExamples", complete_examples as f64);

        let y = data.target().view();
        match self.problem {
            ProblemClass::Classification => {
                self.meta_data.insert("NClasses", class_count(y) as f64);
                self.meta_data.insert("YImbalance", class_imbalance(y));
            }
            ProblemClass::Regression => {
                self.meta_data.insert("YStd", sample_std(y));
                self.meta_data.insert("YImbalance", histogram_imbalance(y));
            }
        }
        info!(rows = n_rows, features = columns.len(), "Initial meta-features extracted");
    }

    /// Distributional descriptors of the encoded matrix, then landmarks
    pub fn extract_preprocessed(&mut self, x: &Array2<f64>, y: &Array1<f64>) {
        self.meta_data.insert("STDRatio", std_ratio(x));
        self.meta_data.insert("CorrelationMean", correlation_mean(x));
        self.meta_data
            .insert("SkewnessMean", nan_mean(x.axis_iter(Axis(1)).map(skewness)));
        self.meta_data
            .insert("KurtosisMean", nan_mean(x.axis_iter(Axis(1)).map(kurtosis)));

        for (i, result) in self.landmarks.run(x, y).into_iter().enumerate() {
            self.meta_data.insert(landmark_score_key(i), result.score);
            self.meta_data.insert(landmark_time_key(i), result.seconds);
        }
        info!(n_meta_features = self.meta_data.len(), "Preprocessed meta-features extracted");
    }

    /// Everything extracted so far, in insertion order
    pub fn as_dict(&self) -> &MetaFeatures {
        &self.meta_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::meta_features::schema_keys;
    use ndarray::array;

    #[test]
    fn test_initial_counts_with_missing_and_categorical() {
        let ds = Dataset::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                Column::Numeric(vec![1.0, f64::NAN, 3.0, 4.0]),
                Column::Categorical(vec![Some("x".into()), Some("y".into()), Some("x".into()), Some("y".into())]),
                Column::Numeric(vec![0.5, 0.5, 0.5, 0.5]),
            ],
            array![0.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        let mut extractor = MetaFeatureExtractor::new(ProblemClass::Classification);
        extractor.extract_initial(&ds);
        let mf = extractor.as_dict();
        assert_eq!(mf.get("NNumerical"), Some(2.0));
        assert_eq!(mf.get("NCategorical"), Some(1.0));
        assert_eq!(mf.get("NBinary"), Some(1.0));
        assert_eq!(mf.get("NCompleteFeatures"), Some(2.0));
        assert_eq!(mf.get("NCompleteExamples"), Some(3.0));
        assert_eq!(mf.get("NClasses"), Some(2.0));
        // Counts 1 and 3
        assert!((mf.get("YImbalance").unwrap() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_full_schema_after_both_phases() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * (j + 3)) % 11) as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) + &x.column(1);
        let ds = Dataset::from_matrix(&x, &y).unwrap();
        let mut config = SelectorConfig::new(ProblemClass::Regression);
        config.random_state = Some(1);
        let mut extractor = MetaFeatureExtractor::from_config(&config);
        extractor.extract_initial(&ds);
        extractor.extract_preprocessed(&x, &y);

        let keys: Vec<String> = extractor.as_dict().keys().map(str::to_string).collect();
        assert_eq!(keys, schema_keys(ProblemClass::Regression));
        assert!(extractor.as_dict().get("LandmarkScore3").unwrap() > 0.99);
    }

    #[test]
    fn test_degenerate_input_yields_nan() {
        let x = Array2::from_elem((5, 2), 1.0);
        let y = Array1::from_elem(5, 0.0);
        let mut extractor = MetaFeatureExtractor::new(ProblemClass::Classification);
        extractor.extract_preprocessed(&x, &y);
        let mf = extractor.as_dict();
        assert!(mf.get("STDRatio").unwrap().is_nan());
        assert!(mf.get("CorrelationMean").unwrap().is_nan());
        assert_eq!(mf.get("SkewnessMean"), Some(0.0));
    }
}
