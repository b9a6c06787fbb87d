//! EV Statistics Preprocessing Library
//!
//! Outlier filtering, missing-value imputation and exploratory transformations
//! for tabular electric-vehicle statistics, built on Polars.
//!
//! # Overview
//!
//! - **Outlier Filtering**: IQR fences or Z-scores of the natural log, with
//!   per-column diagnostics
//! - **Imputation**: column-mean fill or iterative round-robin regression
//! - **Cleaning**: drop incomplete rows or columns, constant fills, seeded
//!   masking for imputer evaluation
//! - **Profiling**: per-column summary statistics and outlier detection
//! - **Scaling**: min-max and standard scaling
//! - **Feature Engineering**: group aggregations and derived columns
//! - **PCA**: explained variance, loadings and per-row scores
//!
//! Every operation takes a table and returns a new one; inputs are never
//! mutated. The library logs through `tracing` and prints nothing unless the
//! caller installs a subscriber.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ev_prep::{ImputationPolicy, OutlierPolicy, Pipeline, PrepConfig};
//! use ev_prep::io::{CsvOptions, TextEncoding, load_csv};
//!
//! let df = load_csv("ev.csv", &CsvOptions::default().with_encoding(TextEncoding::Latin1))?;
//!
//! let config = PrepConfig::builder()
//!     .columns(["price", "range_km"])
//!     .imputation(ImputationPolicy::iterative(10, 0))
//!     .outliers(OutlierPolicy::iqr())
//!     .build()?;
//!
//! let result = Pipeline::builder().config(config).build()?.process(df)?;
//! println!("Removed {} rows", result.report.rows_removed);
//! ```
//!
//! # Individual Operations
//!
//! ```rust,ignore
//! use ev_prep::{Imputer, ImputationPolicy, OutlierFilter, OutlierPolicy};
//!
//! let imputed = Imputer::impute(&df, &["price"], ImputationPolicy::MeanFill)?;
//! let filtered = OutlierFilter::filter(&imputed.data, &["price"], OutlierPolicy::zscore_log())?;
//! for diagnostic in filtered.diagnostics() {
//!     eprintln!("{diagnostic}");
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod io;
pub mod outliers;
pub mod pca;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod scaling;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{
    ConfigValidationError, ImputationOrder, ImputationPolicy, OutlierPolicy, PrepConfig,
    PrepConfigBuilder, ScalingMethod,
};
pub use error::{PrepError, Result as PrepResult, ResultExt};
pub use features::{AggFunc, Aggregation, FeatureBuilder};
pub use imputers::{ImputeOutcome, Imputer, IterativeImputer, StatisticalImputer};
pub use outliers::{FilterOutcome, OutlierFilter};
pub use pca::{PcaAnalysis, PcaResult, PcaSummary};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineResult};
pub use profiler::DataProfiler;
pub use reporting::{ImputationSummary, OutlierSummary, ProcessingReport, ReportWriter};
pub use scaling::Scaler;
pub use types::{
    ColumnFilterReport, ColumnSummary, DatasetProfile, ImputationChange, ImputationComparison,
    MissingCount,
};
