//! Imputation module for handling missing values.
//!
//! This module provides two imputation strategies:
//! - Statistical imputation (column mean, constants)
//! - Iterative round-robin regression imputation
//!
//! [`Imputer`] is the table-level entry point that validates the column
//! selection and dispatches on [`ImputationPolicy`].

mod iterative;
mod statistical;

pub use iterative::{IterativeFit, IterativeImputer};
pub use statistical::StatisticalImputer;

use crate::cleaner::DataCleaner;
use crate::config::ImputationPolicy;
use crate::error::{PrepError, Result};
use crate::profiler::statistics::mean;
use crate::types::{ColumnSummary, ImputationChange, ImputationComparison};
use crate::utils::{column_values, observed, validate_columns, with_float_column};
use polars::prelude::*;
use tracing::{debug, info};

/// Result of imputing a table.
#[derive(Debug, Clone)]
pub struct ImputeOutcome {
    /// The imputed table; same shape as the input.
    pub data: DataFrame,
    /// One entry per selected column, in selection order.
    pub changes: Vec<ImputationChange>,
    /// Iterations performed by the iterative policy; `None` for mean fill.
    pub iterations: Option<usize>,
}

impl ImputeOutcome {
    /// Total number of cells filled.
    pub fn total_filled(&self) -> usize {
        self.changes.iter().map(|c| c.filled).sum()
    }

    /// Error for the first selected column that still has missing values.
    pub fn check_complete(&self) -> Option<PrepError> {
        self.changes
            .iter()
            .find(|c| c.after.missing > 0)
            .map(|c| PrepError::MissingValues {
                column: c.name.clone(),
                count: c.after.missing,
            })
    }
}

/// Fills missing numeric values.
pub struct Imputer;

impl Imputer {
    /// Fill every missing entry of `columns` according to `policy`.
    ///
    /// Unselected columns pass through unchanged, missing markers included.
    /// A selected column that had missing entries becomes Float64; complete
    /// columns keep their type.
    ///
    /// # Errors
    ///
    /// `EmptyColumn` when a selected column has missing entries but no observed
    /// value, plus the usual column-selection errors.
    pub fn impute<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        policy: ImputationPolicy,
    ) -> Result<ImputeOutcome> {
        policy.validate()?;
        let columns = validate_columns(df, columns, "imputation")?;
        let values = columns
            .iter()
            .map(|name| column_values(df, name))
            .collect::<Result<Vec<_>>>()?;

        let (filled, iterations): (Vec<Vec<f64>>, Option<usize>) =
            match IterativeImputer::from_policy(&policy) {
                Some(imputer) => {
                    let fit = imputer.fit_transform(&columns, &values)?;
                    let filled = (0..columns.len()).map(|j| fit.column(j)).collect();
                    (filled, Some(fit.iterations))
                }
                None => {
                    let filled = columns
                        .iter()
                        .zip(&values)
                        .map(|(name, v)| StatisticalImputer::fill_mean(name, v))
                        .collect::<Result<Vec<_>>>()?;
                    (filled, None)
                }
            };

        let mut data = df.clone();
        let mut changes = Vec::with_capacity(columns.len());
        for ((name, before), after) in columns.iter().zip(&values).zip(filled) {
            let count = before.iter().filter(|v| v.is_none()).count();
            let after: Vec<Option<f64>> = after.into_iter().map(Some).collect();
            if count > 0 {
                data = with_float_column(&data, name, after.clone())?;
                debug!("Imputed {} values in '{}' ({})", count, name, policy.name());
            }
            changes.push(ImputationChange {
                name: name.clone(),
                filled: count,
                before: ColumnSummary::from_values(name, before),
                after: ColumnSummary::from_values(name, &after),
            });
        }

        let outcome = ImputeOutcome {
            data,
            changes,
            iterations,
        };
        info!(
            "Imputation ({}) filled {} values across {} columns",
            policy.name(),
            outcome.total_filled(),
            columns.len()
        );
        Ok(outcome)
    }

    /// Measure imputation quality by hiding known values.
    ///
    /// Masks `fraction` of the observed values of each column (seeded), imputes
    /// the masked table, and compares the result against the original.
    pub fn evaluate<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        fraction: f64,
        policy: ImputationPolicy,
        seed: u64,
    ) -> Result<Vec<ImputationComparison>> {
        let columns = validate_columns(df, columns, "imputation evaluation")?;
        let masked = DataCleaner::mask_fraction(df, &columns, fraction, seed)?;
        let outcome = Self::impute(&masked, &columns, policy)?;

        let mut comparisons = Vec::with_capacity(columns.len());
        for name in &columns {
            let original = column_values(df, name)?;
            let hidden = column_values(&masked, name)?;
            let imputed = column_values(&outcome.data, name)?;

            let errors: Vec<f64> = original
                .iter()
                .zip(&hidden)
                .zip(&imputed)
                .filter_map(|((o, h), i)| match (o, h, i) {
                    (Some(o), None, Some(i)) => Some((o - i).abs()),
                    _ => None,
                })
                .collect();

            comparisons.push(ImputationComparison {
                name: name.clone(),
                masked: errors.len(),
                original_mean: mean(&observed(&original)),
                imputed_mean: mean(&observed(&imputed)),
                mae: mean(&errors),
            });
        }

        Ok(comparisons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImputationOrder;
    use pretty_assertions::assert_eq;

    fn sample_df() -> DataFrame {
        df![
            "region" => [Some("Europe"), None, Some("China"), Some("USA"), Some("India")],
            "x" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
            "y" => [Some(3.0), Some(5.0), None, Some(9.0), Some(11.0)],
            "z" => [None, Some(1.0), Some(1.0), None, Some(4.0)],
        ]
        .unwrap()
    }

    #[test]
    fn test_mean_fill_replaces_infinity() {
        let df = df!["y" => [10.0, f64::INFINITY, 30.0]].unwrap();

        let outcome = Imputer::impute(&df, &["y"], ImputationPolicy::MeanFill).unwrap();

        assert_eq!(outcome.changes[0].filled, 1);
        assert_eq!(
            column_values(&outcome.data, "y").unwrap(),
            vec![Some(10.0), Some(20.0), Some(30.0)]
        );
    }

    #[test]
    fn test_mean_fill_scenario() {
        let df = df!["y" => [Some(10.0), None, Some(30.0)]].unwrap();

        let outcome = Imputer::impute(&df, &["y"], ImputationPolicy::MeanFill).unwrap();

        assert_eq!(
            column_values(&outcome.data, "y").unwrap(),
            vec![Some(10.0), Some(20.0), Some(30.0)]
        );
        assert_eq!(outcome.changes[0].filled, 1);
        assert_eq!(outcome.iterations, None);
    }

    #[test]
    fn test_mean_fill_preserves_mean() {
        let outcome = Imputer::impute(&sample_df(), &["y", "z"], ImputationPolicy::MeanFill).unwrap();
        for change in &outcome.changes {
            let before = change.before.mean.unwrap();
            let after = change.after.mean.unwrap();
            assert!((before - after).abs() < 1e-12);
            assert_eq!(change.after.missing, 0);
        }
        assert!(outcome.check_complete().is_none());
    }

    #[test]
    fn test_all_missing_column_errors() {
        let df = df!["z" => [None::<f64>, None, None]].unwrap();
        let err = Imputer::impute(&df, &["z"], ImputationPolicy::MeanFill).unwrap_err();
        assert!(matches!(err, PrepError::EmptyColumn(c) if c == "z"));
    }

    #[test]
    fn test_unselected_columns_untouched() {
        let df = sample_df();
        let outcome = Imputer::impute(&df, &["y"], ImputationPolicy::MeanFill).unwrap();

        assert_eq!(outcome.data.shape(), df.shape());
        assert_eq!(outcome.data.column("z").unwrap().null_count(), 2);
        assert_eq!(outcome.data.column("region").unwrap().null_count(), 1);
        assert!(
            outcome
                .data
                .column("x")
                .unwrap()
                .as_materialized_series()
                .equals_missing(df.column("x").unwrap().as_materialized_series())
        );
    }

    #[test]
    fn test_integer_column_widens_when_filled() {
        let df = df![
            "seats" => [Some(4i64), None, Some(6)],
            "doors" => [2i64, 4, 4],
        ]
        .unwrap();

        let outcome = Imputer::impute(&df, &["seats", "doors"], ImputationPolicy::MeanFill).unwrap();

        assert_eq!(outcome.data.column("seats").unwrap().dtype(), &DataType::Float64);
        assert_eq!(outcome.data.column("doors").unwrap().dtype(), &DataType::Int64);
        assert_eq!(
            column_values(&outcome.data, "seats").unwrap(),
            vec![Some(4.0), Some(5.0), Some(6.0)]
        );
    }

    #[test]
    fn test_non_numeric_selection() {
        let err = Imputer::impute(&sample_df(), &["region"], ImputationPolicy::MeanFill).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_COLUMN_TYPE");
    }

    #[test]
    fn test_iterative_fill_completes_and_keeps_observed() {
        let df = sample_df();
        let policy = ImputationPolicy::iterative(10, 7);

        let outcome = Imputer::impute(&df, &["x", "y", "z"], policy).unwrap();

        assert_eq!(outcome.iterations, Some(10));
        assert!(outcome.check_complete().is_none());
        let y = column_values(&outcome.data, "y").unwrap();
        assert_eq!(y[0], Some(3.0));
        assert_eq!(y[4], Some(11.0));
        assert!(y[2].is_some());
    }

    #[test]
    fn test_iterative_fill_is_deterministic() {
        let df = sample_df();
        let policy = ImputationPolicy::IterativeFill {
            max_iterations: 5,
            seed: 3,
            order: ImputationOrder::Random,
            ridge_alpha: 1e-3,
            tolerance: None,
        };

        let a = Imputer::impute(&df, &["x", "y", "z"], policy).unwrap();
        let b = Imputer::impute(&df, &["x", "y", "z"], policy).unwrap();

        assert!(a.data.equals_missing(&b.data));
    }

    #[test]
    fn test_iterative_rejects_zero_iterations() {
        let err = Imputer::impute(&sample_df(), &["y"], ImputationPolicy::iterative(0, 0)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_evaluate_reports_masked_cells() {
        let values: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let df = df!["price" => values].unwrap();

        let report = Imputer::evaluate(&df, &["price"], 0.25, ImputationPolicy::MeanFill, 42).unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].masked, 5);
        assert_eq!(report[0].original_mean, Some(19.5));
        assert!(report[0].imputed_mean.is_some());
        assert!(report[0].mae.unwrap() > 0.0);
        assert!(report[0].mean_difference().unwrap().abs() < 5.0);
    }

    #[test]
    fn test_evaluate_zero_fraction() {
        let df = df!["price" => [1.0, 2.0, 3.0]].unwrap();
        let report = Imputer::evaluate(&df, &["price"], 0.0, ImputationPolicy::MeanFill, 1).unwrap();
        assert_eq!(report[0].masked, 0);
        assert_eq!(report[0].mae, None);
        assert_eq!(report[0].mean_difference(), Some(0.0));
    }
}
