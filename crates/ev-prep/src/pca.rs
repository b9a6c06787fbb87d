//! Principal component analysis.
//!
//! Columns are standardized (population standard deviation, constant columns
//! map to 0) and decomposed with `linfa-reduction`. Explained variance is
//! measured against the trace of the sample covariance matrix, so ratios
//! stay comparable when only a few components are kept.

use crate::error::{PrepError, Result};
use crate::profiler::statistics::{mean, population_std};
use crate::utils::{column_values, validate_columns};
use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_reduction::Pca;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Residual norm below which a basis candidate is linearly dependent.
const BASIS_EPS: f64 = 1e-8;

/// Fitted PCA.
#[derive(Debug, Clone)]
pub struct PcaResult {
    pub columns: Vec<String>,
    /// Share of total variance per component, descending.
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    /// Eigenvalues of the covariance matrix for the kept components.
    pub explained_variance: Vec<f64>,
    /// `components[k][j]`: weight of column `j` in component `k`.
    pub components: Vec<Vec<f64>>,
    /// Covariance matrix of the standardized columns (n - 1 denominator).
    pub covariance: Vec<Vec<f64>>,
    /// One row per input row, columns `PC1..PCk`.
    pub scores: DataFrame,
}

/// Serializable view of a [`PcaResult`] without the per-row scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaSummary {
    pub columns: Vec<String>,
    pub n_components: usize,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    pub components: Vec<Vec<f64>>,
    pub covariance: Vec<Vec<f64>>,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.explained_variance_ratio.len()
    }

    pub fn summary(&self) -> PcaSummary {
        PcaSummary {
            columns: self.columns.clone(),
            n_components: self.n_components(),
            explained_variance_ratio: self.explained_variance_ratio.clone(),
            cumulative_variance: self.cumulative_variance.clone(),
            components: self.components.clone(),
            covariance: self.covariance.clone(),
        }
    }

    /// Scores with `label` copied from the source table, for grouping.
    pub fn scores_with_label(&self, df: &DataFrame, label: &str) -> Result<DataFrame> {
        let column = df
            .column(label)
            .map_err(|_| PrepError::UnknownColumn(label.to_string()))?;
        let mut scores = self.scores.clone();
        scores.with_column(column.clone())?;
        Ok(scores)
    }
}

/// PCA over selected numeric columns.
pub struct PcaAnalysis;

impl PcaAnalysis {
    /// Fit `n_components` principal components on `columns`.
    ///
    /// # Errors
    ///
    /// `MissingValues` if a selected column has a missing entry; impute first.
    /// `InvalidParameter` for fewer than two columns or rows, or a component
    /// count outside `1..=columns`.
    pub fn fit<S: AsRef<str>>(
        df: &DataFrame,
        columns: &[S],
        n_components: usize,
    ) -> Result<PcaResult> {
        let columns = validate_columns(df, columns, "PCA")?;
        let n_features = columns.len();
        let n_samples = df.height();

        if n_features < 2 {
            return Err(PrepError::invalid_parameter(
                "columns",
                "PCA requires at least 2 columns",
            ));
        }
        if n_samples < 2 {
            return Err(PrepError::invalid_parameter(
                "rows",
                "PCA requires at least 2 rows",
            ));
        }
        if n_components == 0 || n_components > n_features {
            return Err(PrepError::invalid_parameter(
                "n_components",
                format!("{n_components} must be within 1..={n_features}"),
            ));
        }

        let standardized = standardize(df, &columns)?;
        let covariance = standardized.t().dot(&standardized) / (n_samples as f64 - 1.0);
        let total_variance = covariance.diag().sum();

        // Centered data has rank at most n - 1; all-constant data has none
        let model = if total_variance > 0.0 {
            let fitted = n_components.min(n_samples - 1);
            let model = Pca::params(fitted)
                .fit(&DatasetBase::from(standardized.clone()))
                .map_err(|e| PrepError::Pca(e.to_string()))?;
            Some(model)
        } else {
            None
        };

        let (kept, explained_variance) =
            leading_components(model.as_ref(), n_samples, n_features, n_components);
        let projected = standardized.dot(&kept.t());

        let explained_variance_ratio: Vec<f64> = explained_variance
            .iter()
            .map(|v| if total_variance > 0.0 { v / total_variance } else { 0.0 })
            .collect();
        let cumulative_variance = explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect();

        let scores = DataFrame::new(
            projected
                .axis_iter(Axis(1))
                .enumerate()
                .map(|(k, col)| Series::new(format!("PC{}", k + 1).into(), col.to_vec()).into())
                .collect(),
        )?;

        debug!(
            "PCA on {} columns x {} rows, kept {} components",
            n_features, n_samples, n_components
        );

        Ok(PcaResult {
            components: kept.outer_iter().map(|c| c.to_vec()).collect(),
            covariance: covariance.outer_iter().map(|r| r.to_vec()).collect(),
            columns,
            explained_variance_ratio,
            cumulative_variance,
            explained_variance,
            scores,
        })
    }
}

/// Centered and scaled data matrix, rows by columns.
fn standardize(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let values = column_values(df, name)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(PrepError::MissingValues {
                column: name.clone(),
                count: missing,
            });
        }
        let values: Vec<f64> = values.into_iter().flatten().collect();
        let m = mean(&values).unwrap_or(0.0);
        let s = population_std(&values).unwrap_or(0.0);
        for (i, x) in values.iter().enumerate() {
            matrix[[i, j]] = if s > 0.0 { (x - m) / s } else { 0.0 };
        }
    }
    Ok(matrix)
}

/// Unit loadings (`n_components` x `n_features`) with their variances, in
/// descending order of variance.
///
/// Loadings are read back through the model's projection of the unit
/// vectors. Components the data cannot support are completed with
/// orthogonal zero-variance directions. Each loading is signed so its
/// largest-magnitude entry is positive.
fn leading_components(
    model: Option<&Pca<f64>>,
    n_samples: usize,
    n_features: usize,
    n_components: usize,
) -> (Array2<f64>, Vec<f64>) {
    let mut loadings: Vec<Array1<f64>> = Vec::with_capacity(n_components);
    let mut variances = Vec::with_capacity(n_components);

    if let Some(model) = model {
        // Row 0 is the origin, row j + 1 the unit vector of feature j
        let basis = Array2::from_shape_fn((n_features + 1, n_features), |(i, j)| {
            if i == j + 1 { 1.0 } else { 0.0 }
        });
        let projected = model.predict(&basis);

        for (k, sigma) in model.singular_values().iter().enumerate() {
            let column = projected.column(k);
            let loading = Array1::from_iter((0..n_features).map(|j| column[j + 1] - column[0]));
            let norm = loading.dot(&loading).sqrt();
            if !sigma.is_finite() || !norm.is_finite() || norm < BASIS_EPS {
                continue;
            }
            loadings.push(orient(loading / norm));
            variances.push(sigma * sigma / (n_samples as f64 - 1.0));
        }
    }

    for axis in 0..n_features {
        if loadings.len() >= n_components {
            break;
        }
        let mut candidate = Array1::<f64>::zeros(n_features);
        candidate[axis] = 1.0;
        for existing in &loadings {
            let overlap = candidate.dot(existing);
            candidate.scaled_add(-overlap, existing);
        }
        let norm = candidate.dot(&candidate).sqrt();
        if norm > BASIS_EPS {
            loadings.push(orient(candidate / norm));
            variances.push(0.0);
        }
    }

    loadings.truncate(n_components);
    variances.truncate(n_components);
    let kept = Array2::from_shape_fn((loadings.len(), n_features), |(k, j)| loadings[k][j]);
    (kept, variances)
}

/// Flip `v` so its largest-magnitude entry is positive.
fn orient(v: Array1<f64>) -> Array1<f64> {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 { -v } else { v }
}
