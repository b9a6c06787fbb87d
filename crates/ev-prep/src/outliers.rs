//! Outlier filtering.
//!
//! Removes rows that are statistical outliers in any selected numeric column.
//! Two policies are supported:
//!
//! - **IQR**: keep values within `[Q1 - k*IQR, Q3 + k*IQR]`, quartiles by linear
//!   interpolation over non-missing values.
//! - **Z-score on log**: take the natural log (non-positive values become
//!   undefined), standardize with the sample mean and standard deviation of the
//!   logged column, keep `|Z| <= threshold`.
//!
//! A row survives only if it passes in every selected column. A missing or
//! undefined value fails retention, and so does every row of a degenerate
//! (zero-variance) column under the Z-score policy. Surviving rows keep their
//! order and the column set never changes.

use crate::config::OutlierPolicy;
use crate::error::{PrepError, Result};
use crate::profiler::statistics::{mean, quartiles, sample_std};
use crate::types::ColumnFilterReport;
use crate::utils::{column_values, float_series, numeric_column_names, observed, validate_columns};
use polars::prelude::*;
use tracing::{debug, warn};

/// Result of filtering a table.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// The filtered table; same columns as the input.
    pub data: DataFrame,
    pub rows_before: usize,
    pub rows_removed: usize,
    pub columns: Vec<ColumnFilterReport>,
}

impl FilterOutcome {
    /// Non-fatal diagnostics, one [`PrepError::DegenerateColumn`] per
    /// zero-variance column.
    pub fn diagnostics(&self) -> Vec<PrepError> {
        self.columns
            .iter()
            .filter(|c| c.degenerate)
            .map(|c| PrepError::DegenerateColumn(c.name.clone()))
            .collect()
    }
}

/// Per-column retention mask plus its report.
struct ColumnCheck {
    keep: Vec<bool>,
    report: ColumnFilterReport,
}

/// Outlier detection and row filtering.
pub struct OutlierFilter;

impl OutlierFilter {
    /// Filter `df` on `columns` with the given policy.
    ///
    /// A row fails retention when any selected value is missing. NaN and
    /// infinite values count as missing, so a single infinity removes its own
    /// row instead of poisoning the column statistics.
    ///
    /// # Errors
    ///
    /// `EmptySelection`, `UnknownColumn` or `InvalidColumnType` for a bad column
    /// selection, `InvalidParameter` for a negative multiplier or non-positive
    /// threshold.
    pub fn filter<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        policy: OutlierPolicy,
    ) -> Result<FilterOutcome> {
        policy.validate()?;
        let columns = validate_columns(df, columns, "outlier filtering")?;
        let rows_before = df.height();

        let mut keep = vec![true; rows_before];
        let mut reports = Vec::with_capacity(columns.len());

        for name in &columns {
            let values = column_values(df, name)?;
            let check = match policy {
                OutlierPolicy::Iqr { multiplier } => Self::check_iqr(name, &values, multiplier),
                OutlierPolicy::ZScoreLog { threshold } => {
                    Self::check_zscore_log(name, &values, threshold)
                }
            };

            if check.report.degenerate {
                warn!(
                    "Column '{}' is degenerate under {}; all rows fail retention",
                    name,
                    policy.name()
                );
            }

            for (k, col_keep) in keep.iter_mut().zip(&check.keep) {
                *k &= *col_keep;
            }
            reports.push(check.report);
        }

        let mask = BooleanChunked::from_slice("mask".into(), &keep);
        let data = df.filter(&mask)?;
        let rows_removed = rows_before - data.height();

        debug!(
            "Outlier filter ({}) removed {} of {} rows across {} columns",
            policy.name(),
            rows_removed,
            rows_before,
            columns.len()
        );

        Ok(FilterOutcome {
            data,
            rows_before,
            rows_removed,
            columns: reports,
        })
    }

    /// Repeat [`filter`](Self::filter) until a pass removes nothing or
    /// `max_passes` is reached. The result of a converged run is a fixed point:
    /// filtering it again removes no rows.
    pub fn filter_until_stable<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        policy: OutlierPolicy,
        max_passes: usize,
    ) -> Result<FilterOutcome> {
        if max_passes == 0 {
            return Err(PrepError::invalid_parameter("max_passes", "must be at least 1"));
        }

        let mut outcome = Self::filter(df, columns, policy)?;
        let mut passes = 1;
        while outcome.rows_removed > 0 && passes < max_passes {
            let next = Self::filter(&outcome.data, columns, policy)?;
            if next.rows_removed == 0 {
                break;
            }
            outcome = FilterOutcome {
                rows_before: df.height(),
                rows_removed: df.height() - next.data.height(),
                ..next
            };
            passes += 1;
        }
        outcome.rows_before = df.height();
        outcome.rows_removed = df.height() - outcome.data.height();

        debug!("Outlier filter stabilized after {} passes", passes);
        Ok(outcome)
    }

    /// Numeric columns containing at least one IQR outlier (k = 1.5).
    pub fn outlier_columns(df: &DataFrame) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for name in numeric_column_names(df) {
            let values = column_values(df, &name)?;
            if observed(&values).is_empty() {
                continue;
            }
            let check = Self::check_iqr(&name, &values, 1.5);
            if check.report.rows_failing > check.report.rows_undefined {
                result.push(name);
            }
        }
        Ok(result)
    }

    /// Append `log_<col>` and `zscore_log_<col>` columns for display.
    ///
    /// Non-positive values have no logarithm and yield missing entries in both
    /// new columns; a degenerate column yields all-missing Z-scores.
    pub fn annotate_log_zscores<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<DataFrame> {
        let columns = validate_columns(df, columns, "log Z-score annotation")?;
        let mut result = df.clone();

        for name in &columns {
            let logged = log_values(&column_values(df, name)?);
            let zscores = zscores(&logged);

            result.with_column(float_series(&format!("log_{name}"), logged))?;
            result.with_column(float_series(&format!("zscore_log_{name}"), zscores))?;
        }

        Ok(result)
    }

    fn check_iqr(name: &str, values: &[Option<f64>], multiplier: f64) -> ColumnCheck {
        let bounds = quartiles(&observed(values)).map(|(q1, q3)| {
            let iqr = q3 - q1;
            (q1 - multiplier * iqr, q3 + multiplier * iqr)
        });

        let keep: Vec<bool> = values
            .iter()
            .map(|v| match (v, bounds) {
                (Some(x), Some((lower, upper))) => *x >= lower && *x <= upper,
                _ => false,
            })
            .collect();

        let rows_undefined = values.iter().filter(|v| v.is_none()).count();
        ColumnCheck {
            report: ColumnFilterReport {
                name: name.to_string(),
                lower: bounds.map(|b| b.0),
                upper: bounds.map(|b| b.1),
                rows_failing: keep.iter().filter(|k| !**k).count(),
                rows_undefined,
                degenerate: false,
            },
            keep,
        }
    }

    fn check_zscore_log(name: &str, values: &[Option<f64>], threshold: f64) -> ColumnCheck {
        let logged = log_values(values);
        let obs = observed(&logged);
        let stats = match (mean(&obs), sample_std(&obs)) {
            (Some(m), Some(s)) if s > 0.0 && s.is_finite() => Some((m, s)),
            _ => None,
        };

        let keep: Vec<bool> = match stats {
            Some((m, s)) => logged
                .iter()
                .map(|v| v.is_some_and(|x| ((x - m) / s).abs() <= threshold))
                .collect(),
            None => vec![false; values.len()],
        };

        ColumnCheck {
            report: ColumnFilterReport {
                name: name.to_string(),
                lower: stats.map(|(m, s)| m - threshold * s),
                upper: stats.map(|(m, s)| m + threshold * s),
                rows_failing: keep.iter().filter(|k| !**k).count(),
                rows_undefined: logged.iter().filter(|v| v.is_none()).count(),
                degenerate: stats.is_none(),
            },
            keep,
        }
    }
}

/// Natural log; non-positive and missing values become `None`.
pub(crate) fn log_values(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| v.filter(|x| *x > 0.0).map(f64::ln))
        .collect()
}

/// Z-scores with the sample standard deviation; all `None` when undefined.
pub(crate) fn zscores(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let obs = observed(values);
    match (mean(&obs), sample_std(&obs)) {
        (Some(m), Some(s)) if s > 0.0 => values.iter().map(|v| v.map(|x| (x - m) / s)).collect(),
        _ => vec![None; values.len()],
    }
}
