//! Append-only CSV log with one row per selection run

use crate::config::ProblemClass;
use crate::error::{Result, SelectionError};
use crate::meta_features::{schema_keys, MetaFeatures};
use crate::selection::Catalog;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::info;

/// Leading column holding the run label
pub const TASK_COLUMN: &str = "Task";

/// Fixed column layout: task, meta-feature keys, candidate ids
#[derive(Debug, Clone, PartialEq)]
pub struct RunLogSchema {
    pub meta_keys: Vec<String>,
    pub candidates: Vec<String>,
}

impl RunLogSchema {
    pub fn for_problem(problem: ProblemClass) -> Self {
        Self {
            meta_keys: schema_keys(problem),
            candidates: Catalog::for_problem(problem)
                .ids()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once(TASK_COLUMN.to_string())
            .chain(self.meta_keys.iter().cloned())
            .chain(self.candidates.iter().cloned())
            .collect()
    }

    pub fn width(&self) -> usize {
        1 + self.meta_keys.len() + self.candidates.len()
    }
}

/// One persisted run
#[derive(Debug, Clone)]
pub struct RunLogRow {
    pub task: String,
    /// Meta-feature values keyed in schema order
    pub meta_features: MetaFeatures,
    /// Relative landmark per catalog candidate; `None` when not evaluated
    pub relative_landmarks: Vec<(String, Option<f64>)>,
}

impl RunLogRow {
    /// Lay out a run in `schema` order. Meta-features missing from
    /// `meta_features` become NaN; candidates missing from `landmarks` stay empty.
    pub fn new(
        schema: &RunLogSchema,
        task: impl Into<String>,
        meta_features: &MetaFeatures,
        landmarks: &[(String, f64)],
    ) -> Self {
        let mut ordered = MetaFeatures::new();
        for (key, value) in schema.meta_keys.iter().zip(meta_features.values_for(&schema.meta_keys)) {
            ordered.insert(key.clone(), value);
        }
        let relative_landmarks = schema
            .candidates
            .iter()
            .map(|id| {
                let value = landmarks.iter().find(|(c, _)| c == id).map(|(_, rl)| *rl);
                (id.clone(), value)
            })
            .collect();
        Self {
            task: task.into(),
            meta_features: ordered,
            relative_landmarks,
        }
    }

    /// Relative landmark recorded for `candidate`
    pub fn landmark(&self, candidate: &str) -> Option<f64> {
        self.relative_landmarks
            .iter()
            .find(|(c, _)| c == candidate)
            .and_then(|(_, v)| *v)
    }

    fn to_record(&self, schema: &RunLogSchema) -> Vec<String> {
        let mut record = Vec::with_capacity(schema.width());
        record.push(self.task.clone());
        record.extend(self.meta_features.values_for(&schema.meta_keys).into_iter().map(format_value));
        record.extend(
            schema
                .candidates
                .iter()
                .map(|id| self.landmark(id).map(format_value).unwrap_or_default()),
        );
        record
    }

    fn from_record(schema: &RunLogSchema, record: &csv::StringRecord, line: usize) -> Result<Self> {
        if record.len() != schema.width() {
            return Err(SelectionError::SchemaMismatch(format!(
                "row {} has {} fields, expected {}",
                line,
                record.len(),
                schema.width()
            )));
        }
        let mut meta_features = MetaFeatures::new();
        for (i, key) in schema.meta_keys.iter().enumerate() {
            meta_features.insert(key.clone(), parse_value(&record[1 + i], line)?);
        }
        let offset = 1 + schema.meta_keys.len();
        let mut relative_landmarks = Vec::with_capacity(schema.candidates.len());
        for (i, id) in schema.candidates.iter().enumerate() {
            let cell = &record[offset + i];
            let value = if cell.is_empty() { None } else { Some(parse_value(cell, line)?) };
            relative_landmarks.push((id.clone(), value));
        }
        Ok(Self {
            task: record[0].to_string(),
            meta_features,
            relative_landmarks,
        })
    }
}

/// Shortest representation that parses back to the same bits; NaN as `NaN`
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

fn parse_value(cell: &str, line: usize) -> Result<f64> {
    cell.trim()
        .parse::<f64>()
        .map_err(|e| SelectionError::DataError(format!("row {}: cannot parse '{}': {}", line, cell, e)))
}

/// CSV run log bound to one schema
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
    schema: RunLogSchema,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>, schema: RunLogSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &RunLogSchema {
        &self.schema
    }

    fn has_content(&self) -> bool {
        std::fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false)
    }

    fn check_header(&self) -> Result<()> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let expected = self.schema.header();
        if found != expected {
            let first_difference = found
                .iter()
                .zip(expected.iter())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| found.len().min(expected.len()));
            return Err(SelectionError::SchemaMismatch(format!(
                "{}: header differs at column {} ({} columns found, {} expected)",
                self.path.display(),
                first_difference,
                found.len(),
                expected.len()
            )));
        }
        Ok(())
    }

    /// Append one row, creating the file with a header when absent
    pub fn append(&self, row: &RunLogRow) -> Result<()> {
        let exists = self.has_content();
        if exists {
            self.check_header()?;
        } else if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if !exists {
            writer.write_record(self.schema.header())?;
        }
        writer.write_record(row.to_record(&self.schema))?;
        writer.flush()?;

        info!(path = %self.path.display(), task = %row.task, "Run log row appended");
        Ok(())
    }

    /// Every row in file order; an absent file reads as empty
    pub fn read(&self) -> Result<Vec<RunLogRow>> {
        if !self.has_content() {
            return Ok(Vec::new());
        }
        self.check_header()?;
        let mut reader = csv::Reader::from_path(&self.path)?;
        reader
            .records()
            .enumerate()
            .map(|(i, record)| RunLogRow::from_record(&self.schema, &record?, i + 2))
            .collect()
    }
}
