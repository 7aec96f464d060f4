//! automl-selector - meta-learning model selection under a time budget
//!
//! Given a tabular dataset, the engine describes it with meta-features,
//! predicts which candidate models are likely to do well, cross-validates
//! candidates best-first until a wall-clock budget runs out, and picks the
//! candidate with the best trade-off between accuracy and evaluation time.
//!
//! # Modules
//!
//! ## Selection engine
//! - [`meta_features`] - Dataset descriptors and landmark baselines
//! - [`selection`] - Candidate catalog, meta-models, time-boxed evaluation and ranking
//! - [`training`] - Candidate learners, cross-validation and scoring
//!
//! ## Collaborators
//! - [`preprocessing`] - Imputation, encoding and scaling
//! - [`autopipeline`] - End-to-end fit/predict pipeline
//! - [`tracking`] - Persisted run log
//!
//! ## Infrastructure
//! - [`config`] - Selector configuration
//! - [`dataset`] - Tabular dataset model
//! - [`utils`] - CSV loading and deadlines
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Configuration and data
pub mod config;
pub mod dataset;

// Selection engine
pub mod meta_features;
pub mod selection;
pub mod training;

// Collaborators
pub mod autopipeline;
pub mod preprocessing;
pub mod tracking;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, SelectionError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SelectionError};

    // Configuration and data
    pub use crate::config::{ProblemClass, SelectorConfig};
    pub use crate::dataset::{Column, Dataset};
    pub use crate::utils::DataLoader;

    // Meta-features
    pub use crate::meta_features::{MetaFeatureExtractor, MetaFeatures};

    // Selection
    pub use crate::selection::{
        CandidateSpec, Catalog, EvaluatorState, MetaModelStore, ModelEvaluator, ModelKind, OrderPredictor,
        RelativeLandmark,
    };

    // Training
    pub use crate::training::Estimator;

    // Preprocessing
    pub use crate::preprocessing::{Preprocessing, PreprocessingConfig, StandardPreprocessing, Transform};

    // Auto pipeline
    pub use crate::autopipeline::AutoSelect;

    // Tracking
    pub use crate::tracking::{RunLog, RunLogRow, RunLogSchema};
}
