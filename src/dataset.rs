//! Tabular dataset with mixed numeric and categorical features

use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;

/// A single feature column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values, NaN marks a missing entry
    Numeric(Vec<f64>),
    /// Categorical values, `None` marks a missing entry
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Whether the entry at `row` is missing
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Numeric(v) => v[row].is_nan(),
            Column::Categorical(v) => v[row].is_none(),
        }
    }

    /// Number of missing entries
    pub fn n_missing(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    /// Number of distinct values, counting "missing" as one value
    pub fn n_unique_with_missing(&self) -> usize {
        match self {
            Column::Numeric(v) => {
                let mut seen: BTreeSet<u64> = BTreeSet::new();
                let mut has_nan = false;
                for &val in v {
                    if val.is_nan() {
                        has_nan = true;
                    } else {
                        // -0.0 and 0.0 are the same value
                        let normalized = if val == 0.0 { 0.0 } else { val };
                        seen.insert(normalized.to_bits());
                    }
                }
                seen.len() + usize::from(has_nan)
            }
            Column::Categorical(v) => {
                let distinct: BTreeSet<Option<&str>> = v.iter().map(|s| s.as_deref()).collect();
                distinct.len()
            }
        }
    }
}

/// Feature table plus target vector
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    columns: Vec<Column>,
    target: Array1<f64>,
    target_labels: Option<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from named columns and a numeric target
    pub fn new(feature_names: Vec<String>, columns: Vec<Column>, target: Array1<f64>) -> Result<Self> {
        if feature_names.len() != columns.len() {
            return Err(SelectionError::ShapeError {
                expected: format!("{} column names", columns.len()),
                actual: format!("{} column names", feature_names.len()),
            });
        }
        for (name, column) in feature_names.iter().zip(&columns) {
            if column.len() != target.len() {
                return Err(SelectionError::ShapeError {
                    expected: format!("{} rows", target.len()),
                    actual: format!("{} rows in column '{}'", column.len(), name),
                });
            }
        }
        Ok(Self {
            feature_names,
            columns,
            target,
            target_labels: None,
        })
    }

    /// Build an all-numeric dataset from a matrix, naming columns `f0..fn`
    pub fn from_matrix(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let names = (0..x.ncols()).map(|j| format!("f{}", j)).collect();
        let columns = x
            .columns()
            .into_iter()
            .map(|c| Column::Numeric(c.to_vec()))
            .collect();
        Self::new(names, columns, y.clone())
    }

    /// Build a dataset whose target holds string labels; labels are encoded
    /// as their index in sorted order
    pub fn with_labels(
        feature_names: Vec<String>,
        columns: Vec<Column>,
        labels: &[String],
    ) -> Result<Self> {
        let distinct: BTreeSet<&String> = labels.iter().collect();
        let label_names: Vec<String> = distinct.into_iter().cloned().collect();
        let target: Array1<f64> = labels
            .iter()
            .map(|l| label_names.iter().position(|n| n == l).unwrap_or(0) as f64)
            .collect();
        let mut dataset = Self::new(feature_names, columns, target)?;
        dataset.target_labels = Some(label_names);
        Ok(dataset)
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    /// Original names of encoded target labels, if the target was textual
    pub fn target_labels(&self) -> Option<&[String]> {
        self.target_labels.as_deref()
    }

    /// Feature matrix for an all-numeric dataset
    pub fn numeric_matrix(&self) -> Result<Array2<f64>> {
        let mut x = Array2::zeros((self.n_rows(), self.n_features()));
        for (j, (name, column)) in self.feature_names.iter().zip(&self.columns).enumerate() {
            match column {
                Column::Numeric(values) => {
                    for (i, &v) in values.iter().enumerate() {
                        x[[i, j]] = v;
                    }
                }
                Column::Categorical(_) => {
                    return Err(SelectionError::DataError(format!(
                        "column '{}' is categorical and must be encoded first",
                        name
                    )));
                }
            }
        }
        Ok(x)
    }

    /// Whether any feature value is missing
    pub fn has_missing(&self) -> bool {
        self.columns.iter().any(|c| c.n_missing() > 0)
    }

    /// Whether every feature is numeric
    pub fn is_all_numeric(&self) -> bool {
        self.columns.iter().all(Column::is_numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unique_counts_missing_as_value() {
        let col = Column::Numeric(vec![1.0, f64::NAN, 1.0, 1.0]);
        assert_eq!(col.n_unique_with_missing(), 2);
        assert_eq!(col.n_missing(), 1);

        let col = Column::Categorical(vec![Some("a".into()), None, Some("b".into())]);
        assert_eq!(col.n_unique_with_missing(), 3);
    }

    #[test]
    fn test_numeric_matrix() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let ds = Dataset::from_matrix(&x, &array![0.0, 1.0]).unwrap();
        assert_eq!(ds.numeric_matrix().unwrap(), x);
        assert!(ds.is_all_numeric());
    }

    #[test]
    fn test_categorical_blocks_numeric_matrix() {
        let ds = Dataset::new(
            vec!["c".into()],
            vec![Column::Categorical(vec![Some("x".into()), Some("y".into())])],
            array![0.0, 1.0],
        )
        .unwrap();
        assert!(ds.numeric_matrix().is_err());
    }

    #[test]
    fn test_row_mismatch_rejected() {
        let result = Dataset::new(
            vec!["a".into()],
            vec![Column::Numeric(vec![1.0, 2.0, 3.0])],
            array![0.0, 1.0],
        );
        assert!(matches!(result, Err(SelectionError::ShapeError { .. })));
    }

    #[test]
    fn test_label_encoding() {
        let labels: Vec<String> = ["dog", "cat", "dog"].iter().map(|s| s.to_string()).collect();
        let ds = Dataset::with_labels(
            vec!["a".into()],
            vec![Column::Numeric(vec![1.0, 2.0, 3.0])],
            &labels,
        )
        .unwrap();
        assert_eq!(ds.target(), &array![1.0, 0.0, 1.0]);
        assert_eq!(ds.target_labels().unwrap(), &["cat".to_string(), "dog".to_string()]);
    }
}
