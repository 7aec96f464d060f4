//! Per-column encoding plans: numeric passthrough with imputation, one-hot
//! and ordinal encoding of categories

use super::imputer::{mean_fill, most_frequent, ImputeStrategy};
use crate::dataset::Column;
use crate::error::{Result, SelectionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How one input column maps to output columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnPlan {
    /// Copied through, missing entries replaced by `fill`
    Numeric { fill: f64 },
    /// One indicator column per category; unseen values encode as all zeros
    OneHot { categories: Vec<String>, fill: String },
    /// Index of the category in `categories`; unseen values take the index
    /// of `fill`
    Ordinal { categories: Vec<String>, fill: String },
}

impl ColumnPlan {
    /// Output width of this plan
    pub fn width(&self) -> usize {
        match self {
            ColumnPlan::OneHot { categories, .. } => categories.len(),
            _ => 1,
        }
    }

    /// Write the encoded value of `column[row]` into `out`
    fn encode_into(&self, column: &Column, row: usize, out: &mut [f64]) -> Result<()> {
        match (self, column) {
            (ColumnPlan::Numeric { fill }, Column::Numeric(values)) => {
                let v = values[row];
                out[0] = if v.is_nan() { *fill } else { v };
            }
            (ColumnPlan::OneHot { categories, fill }, Column::Categorical(values)) => {
                let value = values[row].as_deref().unwrap_or(fill.as_str());
                out.iter_mut().for_each(|o| *o = 0.0);
                if let Some(k) = categories.iter().position(|c| c == value) {
                    out[k] = 1.0;
                }
            }
            (ColumnPlan::Ordinal { categories, fill }, Column::Categorical(values)) => {
                let value = values[row].as_deref().unwrap_or(fill.as_str());
                let index = categories
                    .iter()
                    .position(|c| c == value)
                    .or_else(|| categories.iter().position(|c| c == fill))
                    .unwrap_or(0);
                out[0] = index as f64;
            }
            _ => {
                return Err(SelectionError::PreprocessingError(
                    "column kind changed between fit and transform".to_string(),
                ))
            }
        }
        Ok(())
    }
}

/// Column encoder fitted on a dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnEncoder {
    plans: Vec<ColumnPlan>,
}

impl ColumnEncoder {
    /// Plan every column.
    ///
    /// Categorical columns with at most `max_onehot_categories` distinct
    /// values are one-hot encoded, the rest ordinal in sorted order. An entry
    /// in `ordered` fixes the category order for that column and forces
    /// ordinal encoding.
    pub fn fit(
        names: &[String],
        columns: &[Column],
        max_onehot_categories: usize,
        ordered: &[(String, Vec<String>)],
        numeric_strategy: ImputeStrategy,
    ) -> Result<Self> {
        let mut plans = Vec::with_capacity(columns.len());
        for (name, column) in names.iter().zip(columns) {
            let plan = match column {
                Column::Numeric(values) => {
                    let fill = match numeric_strategy {
                        ImputeStrategy::Mean => mean_fill(values),
                        ImputeStrategy::MostFrequent => numeric_mode(values),
                    };
                    ColumnPlan::Numeric { fill }
                }
                Column::Categorical(values) => {
                    let fill = most_frequent(values).unwrap_or_default();
                    if let Some((_, order)) = ordered.iter().find(|(n, _)| n == name) {
                        ColumnPlan::Ordinal {
                            categories: order.clone(),
                            fill,
                        }
                    } else {
                        let mut categories: BTreeSet<String> = values.iter().flatten().cloned().collect();
                        categories.insert(fill.clone());
                        let categories: Vec<String> = categories.into_iter().collect();
                        if categories.len() <= max_onehot_categories {
                            ColumnPlan::OneHot { categories, fill }
                        } else {
                            ColumnPlan::Ordinal { categories, fill }
                        }
                    }
                }
            };
            plans.push(plan);
        }
        Ok(Self { plans })
    }

    pub fn plans(&self) -> &[ColumnPlan] {
        &self.plans
    }

    pub fn output_width(&self) -> usize {
        self.plans.iter().map(ColumnPlan::width).sum()
    }

    /// Encode `columns` into a dense row-major buffer of `n_rows` rows
    pub fn encode(&self, columns: &[Column], n_rows: usize) -> Result<Vec<f64>> {
        if columns.len() != self.plans.len() {
            return Err(SelectionError::ShapeError {
                expected: format!("{} columns", self.plans.len()),
                actual: format!("{} columns", columns.len()),
            });
        }
        let width = self.output_width();
        let mut out = vec![0.0; n_rows * width];
        for row in 0..n_rows {
            let mut offset = row * width;
            for (plan, column) in self.plans.iter().zip(columns) {
                let w = plan.width();
                plan.encode_into(column, row, &mut out[offset..offset + w])?;
                offset += w;
            }
        }
        Ok(out)
    }
}

fn numeric_mode(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut best = (0.0, 0usize);
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best.1 {
            best = (sorted[i], j - i);
        }
        i = j;
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(values: &[Option<&str>]) -> Column {
        Column::Categorical(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_one_hot_with_imputation() {
        let names = vec!["colour".to_string()];
        let columns = vec![cat(&[Some("red"), Some("blue"), Some("red"), None])];
        let encoder = ColumnEncoder::fit(&names, &columns, 10, &[], ImputeStrategy::Mean).unwrap();
        assert_eq!(encoder.output_width(), 2);
        // Categories sorted: blue, red; missing becomes red
        let out = encoder.encode(&columns, 4).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_high_cardinality_is_ordinal() {
        let names = vec!["id".to_string()];
        let labels: Vec<String> = (0..12).map(|i| format!("v{:02}", i)).collect();
        let columns = vec![Column::Categorical(labels.iter().cloned().map(Some).collect())];
        let encoder = ColumnEncoder::fit(&names, &columns, 10, &[], ImputeStrategy::Mean).unwrap();
        assert!(matches!(encoder.plans()[0], ColumnPlan::Ordinal { .. }));
        let out = encoder.encode(&columns, 12).unwrap();
        assert_eq!(out[11], 11.0);
    }

    #[test]
    fn test_declared_order() {
        let names = vec!["size".to_string()];
        let columns = vec![cat(&[Some("small"), Some("large"), Some("medium")])];
        let order = vec![(
            "size".to_string(),
            vec!["small".to_string(), "medium".to_string(), "large".to_string()],
        )];
        let encoder = ColumnEncoder::fit(&names, &columns, 10, &order, ImputeStrategy::Mean).unwrap();
        assert_eq!(encoder.encode(&columns, 3).unwrap(), vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_numeric_mean_fill() {
        let names = vec!["x".to_string()];
        let columns = vec![Column::Numeric(vec![1.0, f64::NAN, 5.0])];
        let encoder = ColumnEncoder::fit(&names, &columns, 10, &[], ImputeStrategy::Mean).unwrap();
        assert_eq!(encoder.encode(&columns, 3).unwrap(), vec![1.0, 3.0, 5.0]);
    }
}
