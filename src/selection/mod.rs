//! Model selection engine
//!
//! The [`Catalog`] lists the candidate model kinds of a problem class. An
//! [`OrderPredictor`] uses pretrained meta-models to decide which candidates
//! to try first, the [`ModelEvaluator`] cross-validates them under a time
//! budget, and the scores are normalized and traded off against elapsed
//! time into relative landmarks from which the best model is picked.

mod catalog;
mod evaluator;
pub mod meta_model;
mod order;
pub mod scoring;

pub use catalog::{CandidateSpec, Catalog, ModelKind};
pub use evaluator::{EvaluationRecord, EvaluatorState, ModelEvaluator, RelativeLandmark};
pub use meta_model::{train_meta_models, MetaModel, MetaModelStore, MetaRegressor};
pub use order::OrderPredictor;
pub use scoring::{RelativeLandmarkScorer, ScoreNormalizer, NORMALIZATION_EPSILON};
