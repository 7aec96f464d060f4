//! Utility functions and types

pub mod data_loader;
mod deadline;

pub use data_loader::DataLoader;
pub use deadline::Deadline;
