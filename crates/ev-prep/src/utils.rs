//! Shared column helpers.
//!
//! Every transformation validates its column selection and reads numeric
//! values through these functions, so type and missing-value handling stays
//! consistent across modules.

use crate::error::{PrepError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Names of all numeric columns, in table order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

// =============================================================================
// Column Selection
// =============================================================================

/// Validate a column selection against a table.
///
/// Every name must exist and be numeric. An empty selection is rejected with
/// [`PrepError::EmptySelection`] naming `operation`.
pub fn validate_columns<S: AsRef<str>>(
    df: &DataFrame,
    columns: &[S],
    operation: &'static str,
) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Err(PrepError::EmptySelection(operation));
    }

    let mut validated = Vec::with_capacity(columns.len());
    for name in columns {
        let name = name.as_ref();
        let column = df
            .column(name)
            .map_err(|_| PrepError::UnknownColumn(name.to_string()))?;
        if !is_numeric_dtype(column.dtype()) {
            return Err(PrepError::InvalidColumnType {
                column: name.to_string(),
                dtype: column.dtype().to_string(),
            });
        }
        if !validated.iter().any(|c: &String| c == name) {
            validated.push(name.to_string());
        }
    }
    Ok(validated)
}

/// Like [`validate_columns`], but an empty selection means every numeric column.
pub fn resolve_columns<S: AsRef<str>>(
    df: &DataFrame,
    columns: &[S],
    operation: &'static str,
) -> Result<Vec<String>> {
    if columns.is_empty() {
        let all = numeric_column_names(df);
        return validate_columns(df, &all, operation);
    }
    validate_columns(df, columns, operation)
}

// =============================================================================
// Value Access
// =============================================================================

/// Read a numeric column as `f64` values. Nulls, NaN and infinities map to
/// `None`.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PrepError::UnknownColumn(name.to_string()))?;
    series_values(column.as_materialized_series())
}

/// Read a numeric series as `f64` values. Nulls, NaN and infinities map to
/// `None`, so every operation sees them as missing.
pub fn series_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let float_series = series.cast(&DataType::Float64)?;
    let values = float_series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// The non-missing values, in row order.
pub fn observed(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Build a Float64 series from optional values.
pub fn float_series(name: &str, values: Vec<Option<f64>>) -> Series {
    Series::new(name.into(), values)
}

/// Return a copy of `df` with `name` replaced by the given values as Float64.
pub fn with_float_column(df: &DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<DataFrame> {
    let mut result = df.clone();
    result.replace(name, float_series(name, values))?;
    Ok(result)
}

/// Number of missing entries in a column (null, NaN or infinite).
pub fn missing_count(df: &DataFrame, name: &str) -> Result<usize> {
    Ok(column_values(df, name)?.iter().filter(|v| v.is_none()).count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df![
            "region" => ["Europe", "China", "USA"],
            "year" => [2020i64, 2021, 2022],
            "price" => [Some(30_000.0), None, Some(f64::NAN)],
        ]
        .unwrap()
    }

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_numeric_column_names() {
        assert_eq!(numeric_column_names(&sample_df()), vec!["year", "price"]);
    }

    #[test]
    fn test_validate_columns_unknown() {
        let err = validate_columns(&sample_df(), &["range_km"], "test").unwrap_err();
        assert!(matches!(err, PrepError::UnknownColumn(c) if c == "range_km"));
    }

    #[test]
    fn test_validate_columns_non_numeric() {
        let err = validate_columns(&sample_df(), &["region"], "test").unwrap_err();
        assert!(matches!(err, PrepError::InvalidColumnType { column, .. } if column == "region"));
    }

    #[test]
    fn test_validate_columns_empty() {
        let empty: [&str; 0] = [];
        let err = validate_columns(&sample_df(), &empty, "test").unwrap_err();
        assert!(matches!(err, PrepError::EmptySelection("test")));
    }

    #[test]
    fn test_validate_columns_deduplicates() {
        let cols = validate_columns(&sample_df(), &["year", "year"], "test").unwrap();
        assert_eq!(cols, vec!["year"]);
    }

    #[test]
    fn test_resolve_columns_defaults_to_numeric() {
        let empty: [&str; 0] = [];
        let cols = resolve_columns(&sample_df(), &empty, "test").unwrap();
        assert_eq!(cols, vec!["year", "price"]);
    }

    #[test]
    fn test_column_values_treats_nan_as_missing() {
        let values = column_values(&sample_df(), "price").unwrap();
        assert_eq!(values, vec![Some(30_000.0), None, None]);
        assert_eq!(missing_count(&sample_df(), "price").unwrap(), 2);
    }

    #[test]
    fn test_column_values_treats_infinity_as_missing() {
        let df = df!["v" => [1.0, f64::INFINITY, f64::NEG_INFINITY, 4.0]].unwrap();
        assert_eq!(
            column_values(&df, "v").unwrap(),
            vec![Some(1.0), None, None, Some(4.0)]
        );
        assert_eq!(missing_count(&df, "v").unwrap(), 2);
    }

    #[test]
    fn test_column_values_casts_integers() {
        let values = column_values(&sample_df(), "year").unwrap();
        assert_eq!(values, vec![Some(2020.0), Some(2021.0), Some(2022.0)]);
    }

    #[test]
    fn test_with_float_column_replaces_values() {
        let df = with_float_column(&sample_df(), "year", vec![Some(1.0), None, Some(3.0)]).unwrap();
        assert_eq!(df.column("year").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("year").unwrap().null_count(), 1);
        assert_eq!(df.width(), 3);
    }
}
