//! Column profiling.
//!
//! Produces the summary tables the analysis front end displays: per-column
//! statistics, missing counts, and which columns hold IQR outliers.

pub mod statistics;

use crate::error::Result;
use crate::outliers::OutlierFilter;
use crate::types::{ColumnSummary, DatasetProfile, MissingCount};
use crate::utils::{column_values, numeric_column_names, observed, series_values};
use polars::prelude::*;
use tracing::debug;

impl ColumnSummary {
    /// Summarize a numeric series.
    pub fn from_series(series: &Series) -> Result<Self> {
        Ok(Self::from_values(series.name().as_str(), &series_values(series)?))
    }

    /// Summarize a numeric column of a table.
    pub fn from_column(df: &DataFrame, name: &str) -> Result<Self> {
        Ok(Self::from_values(name, &column_values(df, name)?))
    }

    /// Summarize already-extracted values.
    pub fn from_values(name: &str, values: &[Option<f64>]) -> Self {
        let obs = observed(values);
        let sorted = statistics::sorted(&obs);
        Self {
            name: name.to_string(),
            count: obs.len(),
            missing: values.len() - obs.len(),
            mean: statistics::mean(&obs),
            std: statistics::sample_std(&obs),
            min: sorted.first().copied(),
            q1: statistics::quantile_sorted(&sorted, 0.25),
            median: statistics::quantile_sorted(&sorted, 0.5),
            q3: statistics::quantile_sorted(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }
}

/// Profiles tables.
pub struct DataProfiler;

impl DataProfiler {
    /// Describe every column: numeric summaries, missing counts, outlier columns.
    pub fn describe(df: &DataFrame) -> Result<DatasetProfile> {
        let numeric = numeric_column_names(df)
            .iter()
            .map(|name| ColumnSummary::from_column(df, name))
            .collect::<Result<Vec<_>>>()?;

        let mut missing = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let count = match numeric.iter().find(|s| s.name == col.name().as_str()) {
                Some(summary) => summary.missing,
                None => series.null_count(),
            };
            missing.push(MissingCount {
                name: col.name().to_string(),
                dtype: col.dtype().to_string(),
                missing: count,
            });
        }

        let outlier_columns = OutlierFilter::outlier_columns(df)?;
        debug!(
            "Profiled {} columns ({} numeric, {} with outliers)",
            df.width(),
            numeric.len(),
            outlier_columns.len()
        );

        Ok(DatasetProfile {
            shape: df.shape(),
            numeric,
            missing,
            outlier_columns,
        })
    }

    /// Summaries for a subset of columns, in the given order.
    pub fn summarize<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<Vec<ColumnSummary>> {
        columns
            .iter()
            .map(|c| ColumnSummary::from_column(df, c.as_ref()))
            .collect()
    }
}
