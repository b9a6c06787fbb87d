//! Missing-value cleaning.
//!
//! This module provides functionality for:
//! - Dropping rows or columns that contain missing values
//! - Filling numeric columns with fixed constants
//! - Masking a seeded random fraction of values, to evaluate imputers
//! - Selecting the rows of one category

use crate::error::{PrepError, Result};
use crate::imputers::StatisticalImputer;
use crate::utils::{
    column_values, is_numeric_dtype, series_values, validate_columns, with_float_column,
};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use tracing::{debug, info};

/// Data cleaner for missing-value operations.
pub struct DataCleaner;

impl DataCleaner {
    /// Keep only rows without a missing value in any column.
    pub fn drop_rows_with_missing(df: &DataFrame) -> Result<DataFrame> {
        let mut keep = vec![true; df.height()];
        for col in df.get_columns() {
            let missing = Self::missing_mask(col)?;
            for (k, m) in keep.iter_mut().zip(missing) {
                *k &= !m;
            }
        }

        let mask = BooleanChunked::from_slice("mask".into(), &keep);
        let result = df.filter(&mask)?;
        info!(
            "Dropped {} rows with missing values",
            df.height() - result.height()
        );
        Ok(result)
    }

    /// Remove every column that contains a missing value.
    pub fn drop_columns_with_missing(df: &DataFrame) -> Result<DataFrame> {
        let mut to_drop: Vec<PlSmallStr> = Vec::new();
        for col in df.get_columns() {
            if Self::missing_mask(col)?.into_iter().any(|m| m) {
                to_drop.push(col.name().clone());
            }
        }

        if to_drop.is_empty() {
            return Ok(df.clone());
        }
        info!("Dropping {} columns with missing values: {:?}", to_drop.len(), to_drop);
        Ok(df.drop_many(to_drop))
    }

    /// Fill missing entries of numeric columns with per-column constants.
    ///
    /// Columns that receive a fill become Float64.
    pub fn fill_constants<I, S>(df: &DataFrame, fills: I) -> Result<DataFrame>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut result = df.clone();
        for (name, value) in fills {
            let name = name.as_ref();
            validate_columns(df, &[name], "constant fill")?;
            let values = column_values(&result, name)?;
            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing == 0 {
                continue;
            }
            let filled = StatisticalImputer::fill_constant(&values, value)
                .into_iter()
                .map(Some)
                .collect();
            result = with_float_column(&result, name, filled)?;
            debug!("Filled {} missing values in '{}' with {}", missing, name, value);
        }
        Ok(result)
    }

    /// Set a seeded random `fraction` of the observed values of each column to
    /// missing.
    ///
    /// The count per column is `round(fraction * observed)`. Masked columns
    /// become Float64.
    pub fn mask_fraction<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        fraction: f64,
        seed: u64,
    ) -> Result<DataFrame> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(PrepError::invalid_parameter(
                "fraction",
                format!("{fraction} must be within [0, 1]"),
            ));
        }
        let columns = validate_columns(df, columns, "masking")?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut result = df.clone();

        for name in &columns {
            let mut values = column_values(df, name)?;
            let observed: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
            let amount = (fraction * observed.len() as f64).round() as usize;
            if amount == 0 {
                continue;
            }
            for idx in sample(&mut rng, observed.len(), amount) {
                values[observed[idx]] = None;
            }
            result = with_float_column(&result, name, values)?;
            debug!("Masked {} values in '{}'", amount, name);
        }

        Ok(result)
    }

    /// Rows whose `column` equals `value` when read as text.
    pub fn rows_where_equal(df: &DataFrame, column: &str, value: &str) -> Result<DataFrame> {
        df.column(column)
            .map_err(|_| PrepError::UnknownColumn(column.to_string()))?;

        let result = df
            .clone()
            .lazy()
            .filter(col(column).cast(DataType::String).eq(lit(value)))
            .collect()?;
        debug!("{} of {} rows have {} = {}", result.height(), df.height(), column, value);
        Ok(result)
    }

    /// Per-row missing flags for any column. NaN counts as missing for numeric
    /// columns.
    fn missing_mask(col: &Column) -> Result<Vec<bool>> {
        if is_numeric_dtype(col.dtype()) {
            let values = series_values(col.as_materialized_series())?;
            return Ok(values.iter().map(Option::is_none).collect());
        }
        Ok(col
            .as_materialized_series()
            .is_null()
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect())
    }
}
