use serde::{Deserialize, Serialize};

/// Summary statistics of one numeric column, computed over non-missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

/// Missing-value count for any column, numeric or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCount {
    pub name: String,
    pub dtype: String,
    pub missing: usize,
}

/// Profile of a whole table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub shape: (usize, usize),
    pub numeric: Vec<ColumnSummary>,
    pub missing: Vec<MissingCount>,
    /// Numeric columns with at least one IQR outlier (k = 1.5).
    pub outlier_columns: Vec<String>,
}

impl DatasetProfile {
    /// Total missing cells across all columns.
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|m| m.missing).sum()
    }
}

/// Per-column result of an outlier filter pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilterReport {
    pub name: String,
    /// Lower bound for IQR, `mean - t*std` in log space for Z-score.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// Rows whose value in this column failed retention.
    pub rows_failing: usize,
    /// Rows whose value was missing or not log-transformable.
    pub rows_undefined: usize,
    /// Zero variance under the Z-score policy; every row fails.
    pub degenerate: bool,
}

/// Before/after statistics for one imputed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationChange {
    pub name: String,
    pub filled: usize,
    pub before: ColumnSummary,
    pub after: ColumnSummary,
}

/// Outcome of masking and re-imputing one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationComparison {
    pub name: String,
    pub masked: usize,
    pub original_mean: Option<f64>,
    pub imputed_mean: Option<f64>,
    /// Mean absolute error on the masked cells.
    pub mae: Option<f64>,
}

impl ImputationComparison {
    /// `original_mean - imputed_mean`, when both exist.
    pub fn mean_difference(&self) -> Option<f64> {
        Some(self.original_mean? - self.imputed_mean?)
    }
}
