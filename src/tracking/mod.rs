//! Run tracking
//!
//! Each selection run can be persisted as one row of a CSV log: the task
//! label, every meta-feature and the relative landmark of every candidate.
//! The log is the training set for the meta-models.

mod run_log;

pub use run_log::{RunLog, RunLogRow, RunLogSchema, TASK_COLUMN};
