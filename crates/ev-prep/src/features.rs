//! Feature engineering: group aggregations and derived columns.

use crate::error::{PrepError, Result};
use crate::utils::{column_values, float_series, validate_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregation function for [`FeatureBuilder::aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    Sum,
    Mean,
    /// Non-missing values per group.
    Count,
}

impl AggFunc {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Count => "count",
        }
    }
}

/// One output column of a group aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub column: String,
    pub func: AggFunc,
    /// Output name; defaults to `<column>_<func>`.
    #[serde(default)]
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn new(column: impl Into<String>, func: AggFunc) -> Self {
        Self {
            column: column.into(),
            func,
            alias: None,
        }
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Self::new(column, AggFunc::Sum)
    }

    pub fn mean(column: impl Into<String>) -> Self {
        Self::new(column, AggFunc::Mean)
    }

    pub fn count(column: impl Into<String>) -> Self {
        Self::new(column, AggFunc::Count)
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.alias = Some(name.into());
        self
    }

    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.column, self.func.suffix()))
    }

    fn expr(&self) -> Expr {
        let base = col(self.column.as_str());
        let expr = match self.func {
            AggFunc::Sum => base.sum(),
            AggFunc::Mean => base.mean(),
            AggFunc::Count => base.count(),
        };
        expr.alias(self.output_name())
    }
}

/// Builds aggregated tables and derived columns.
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Group by `keys` and compute `aggregations`, one row per group, sorted by
    /// the keys.
    pub fn aggregate<S: AsRef<str>>(
        df: &DataFrame,
        keys: &[S],
        aggregations: &[Aggregation],
    ) -> Result<DataFrame> {
        if keys.is_empty() {
            return Err(PrepError::EmptySelection("aggregation keys"));
        }
        if aggregations.is_empty() {
            return Err(PrepError::EmptySelection("aggregation"));
        }
        for key in keys {
            require_column(df, key.as_ref())?;
        }
        for agg in aggregations {
            match agg.func {
                AggFunc::Count => require_column(df, &agg.column)?,
                AggFunc::Sum | AggFunc::Mean => {
                    validate_columns(df, &[agg.column.as_str()], "aggregation")?;
                }
            }
        }

        let key_exprs: Vec<Expr> = keys.iter().map(|k| col(k.as_ref())).collect();
        let agg_exprs: Vec<Expr> = aggregations.iter().map(Aggregation::expr).collect();

        let result = df
            .clone()
            .lazy()
            .group_by_stable(key_exprs.clone())
            .agg(agg_exprs)
            .sort_by_exprs(key_exprs, SortMultipleOptions::default())
            .collect()?;

        debug!(
            "Aggregated {} rows into {} groups",
            df.height(),
            result.height()
        );
        Ok(result)
    }

    /// Append `name = numerator / denominator`. A zero or missing denominator
    /// gives a missing value.
    pub fn derive_ratio(
        df: &DataFrame,
        numerator: &str,
        denominator: &str,
        name: &str,
    ) -> Result<DataFrame> {
        validate_columns(df, &[numerator, denominator], "ratio")?;
        let num = column_values(df, numerator)?;
        let den = column_values(df, denominator)?;

        let values = num
            .iter()
            .zip(&den)
            .map(|(n, d)| match (n, d) {
                (Some(n), Some(d)) if *d != 0.0 => Some(n / d),
                _ => None,
            })
            .collect();
        append(df, name, values)
    }

    /// Append `name = source * factor`.
    pub fn derive_scaled(df: &DataFrame, source: &str, factor: f64, name: &str) -> Result<DataFrame> {
        validate_columns(df, &[source], "derived column")?;
        let values = column_values(df, source)?
            .into_iter()
            .map(|v| v.map(|x| x * factor))
            .collect();
        append(df, name, values)
    }

    /// Append `name = source * factor` where `condition > threshold`, else
    /// `source`. A missing condition counts as not exceeding the threshold.
    pub fn derive_conditional_scaled(
        df: &DataFrame,
        source: &str,
        condition: &str,
        threshold: f64,
        factor: f64,
        name: &str,
    ) -> Result<DataFrame> {
        validate_columns(df, &[source, condition], "derived column")?;
        let src = column_values(df, source)?;
        let cond = column_values(df, condition)?;

        let values = src
            .iter()
            .zip(&cond)
            .map(|(s, c)| match c {
                Some(c) if *c > threshold => s.map(|x| x * factor),
                _ => *s,
            })
            .collect();
        append(df, name, values)
    }

    /// Append a text column labelling each row by the highest threshold its
    /// `source` value strictly exceeds, or `fallback` when none is exceeded
    /// (including missing values).
    pub fn bucketize<L: AsRef<str>>(
        df: &DataFrame,
        source: &str,
        name: &str,
        thresholds: &[(f64, L)],
        fallback: &str,
    ) -> Result<DataFrame> {
        validate_columns(df, &[source], "bucketing")?;
        let mut ordered: Vec<(f64, &str)> =
            thresholds.iter().map(|(t, l)| (*t, l.as_ref())).collect();
        ordered.sort_by(|a, b| b.0.total_cmp(&a.0));

        let labels: Vec<&str> = column_values(df, source)?
            .iter()
            .map(|v| {
                v.and_then(|x| ordered.iter().find(|(t, _)| x > *t).map(|(_, l)| *l))
                    .unwrap_or(fallback)
            })
            .collect();

        let mut result = df.clone();
        result.with_column(Series::new(name.into(), labels))?;
        Ok(result)
    }
}

fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    df.column(name)
        .map(|_| ())
        .map_err(|_| PrepError::UnknownColumn(name.to_string()))
}

fn append(df: &DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<DataFrame> {
    let mut result = df.clone();
    result.with_column(float_series(name, values))?;
    Ok(result)
}
