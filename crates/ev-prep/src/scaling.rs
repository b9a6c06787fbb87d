//! Feature scaling.

use crate::config::ScalingMethod;
use crate::error::Result;
use crate::profiler::statistics::{mean, population_std};
use crate::utils::{column_values, observed, validate_columns, with_float_column};
use polars::prelude::*;
use tracing::debug;

/// Rescales numeric columns.
pub struct Scaler;

impl Scaler {
    /// Rescale `columns` with `method`; scaled columns become Float64.
    ///
    /// Statistics come from the observed values. Missing entries stay missing
    /// and a constant column maps to 0 under either method.
    pub fn scale<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        method: ScalingMethod,
    ) -> Result<DataFrame> {
        let columns = validate_columns(df, columns, "scaling")?;
        let mut result = df.clone();

        for name in &columns {
            let values = column_values(df, name)?;
            let scaled = match method {
                ScalingMethod::MinMax => min_max(&values),
                ScalingMethod::Standard => standardize(&values),
            };
            result = with_float_column(&result, name, scaled)?;
        }

        debug!("Scaled {} columns ({:?})", columns.len(), method);
        Ok(result)
    }
}

fn min_max(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let obs = observed(values);
    let min = obs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = obs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| v.map(|x| if range > 0.0 { (x - min) / range } else { 0.0 }))
        .collect()
}

fn standardize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let obs = observed(values);
    let (Some(m), Some(s)) = (mean(&obs), population_std(&obs)) else {
        return values.to_vec();
    };

    values
        .iter()
        .map(|v| v.map(|x| if s > 0.0 { (x - m) / s } else { 0.0 }))
        .collect()
}
