//! Pipeline module.
//!
//! Chains imputation, outlier filtering and scaling over one table.

mod builder;

pub use builder::{Pipeline, PipelineBuilder, PipelineResult};
