//! Data loading utilities

use crate::dataset::{Column, Dataset};
use crate::error::{Result, SelectionError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Loads tabular files into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used to infer column types
    infer_schema_length: usize,
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
            delimiter: b',',
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set how many rows are scanned to infer column types
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Read a CSV file into a raw data frame
    pub fn read_frame(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SelectionError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);
        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file);

        reader.finish().map_err(|e| SelectionError::DataError(e.to_string()))
    }

    /// Load a CSV file and split off the `target` column.
    ///
    /// Integer, float and boolean columns become numeric features (nulls read
    /// as NaN); every other column is categorical. A textual target is
    /// label-encoded.
    pub fn load_csv(&self, path: impl AsRef<Path>, target: &str) -> Result<Dataset> {
        let df = self.read_frame(path)?;
        let target_series = df
            .column(target)
            .map_err(|_| SelectionError::FeatureNotFound(target.to_string()))?
            .as_materialized_series();

        let mut names = Vec::with_capacity(df.width().saturating_sub(1));
        let mut columns = Vec::with_capacity(df.width().saturating_sub(1));
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            if name == target {
                continue;
            }
            columns.push(series_to_column(series)?);
            names.push(name);
        }
        debug!(rows = df.height(), features = names.len(), target, "loaded csv");

        if is_numeric_dtype(target_series.dtype()) {
            let values = numeric_values(target_series)?;
            if values.iter().any(|v| v.is_nan()) {
                return Err(SelectionError::DataError(format!(
                    "target column '{}' has missing values",
                    target
                )));
            }
            Dataset::new(names, columns, values.into())
        } else {
            let labels = text_values(target_series)?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        SelectionError::DataError(format!("target column '{}' has missing values", target))
                    })
                })
                .collect::<Result<Vec<String>>>()?;
            Dataset::with_labels(names, columns, &labels)
        }
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean
    )
}

fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

fn series_to_column(series: &Series) -> Result<Column> {
    if is_numeric_dtype(series.dtype()) {
        Ok(Column::Numeric(numeric_values(series)?))
    } else {
        Ok(Column::Categorical(text_values(series)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_mixed_columns() {
        let file = write_csv("age,colour,label\n31,red,yes\n,blue,no\n45,,yes\n");
        let ds = DataLoader::new().load_csv(file.path(), "label").unwrap();
        assert_eq!(ds.feature_names(), &["age".to_string(), "colour".to_string()]);
        assert!(ds.columns()[0].is_numeric());
        assert!(ds.columns()[0].is_missing(1));
        assert!(ds.columns()[1].is_missing(2));
        assert_eq!(ds.target().to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(ds.target_labels().unwrap(), &["no".to_string(), "yes".to_string()]);
    }

    #[test]
    fn test_numeric_target_kept() {
        let file = write_csv("x,y\n1.0,2.5\n2.0,3.5\n");
        let ds = DataLoader::new().load_csv(file.path(), "y").unwrap();
        assert_eq!(ds.target().to_vec(), vec![2.5, 3.5]);
        assert!(ds.target_labels().is_none());
    }

    #[test]
    fn test_missing_target_column() {
        let file = write_csv("x,y\n1,2\n");
        let err = DataLoader::new().load_csv(file.path(), "z").unwrap_err();
        assert!(matches!(err, SelectionError::FeatureNotFound(_)));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let file = write_csv("a;b;target\n1;x;0\n2;y;1\n3;x;0\n");
        let ds = DataLoader::new()
            .with_delimiter(b';')
            .with_infer_schema_length(2)
            .load_csv(file.path(), "target")
            .unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert!(ds.columns()[0].is_numeric());
        assert!(!ds.columns()[1].is_numeric());
    }
}
