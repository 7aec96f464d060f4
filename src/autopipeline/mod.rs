//! Automated selection pipeline
//!
//! [`AutoSelect`] stitches an optional initial transform, the preprocessing
//! collaborator, meta-feature extraction and candidate evaluation into one
//! fit/predict object.

mod pipeline;

pub use pipeline::AutoSelect;
