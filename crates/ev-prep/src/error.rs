//! Error types for the preprocessing library.
//!
//! Every fallible operation returns [`PrepError`]. Errors carry a stable
//! [`error_code`](PrepError::error_code) and serialize as `{code, message}` so a
//! presentation layer can display them without matching on variants.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for table transformations.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Referenced column is absent from the table.
    #[error("Column '{0}' not found in table")]
    UnknownColumn(String),

    /// A non-numeric column was selected for a numeric-only operation.
    #[error("Column '{column}' has type {dtype}, expected a numeric column")]
    InvalidColumnType { column: String, dtype: String },

    /// Mean imputation on a column without a single observed value.
    #[error("Column '{0}' has no non-missing values")]
    EmptyColumn(String),

    /// Zero-variance column under the Z-score policy.
    ///
    /// Not fatal: the outlier filter reports it as a diagnostic and treats
    /// every row of the column as failing retention.
    #[error("Column '{0}' has zero variance after log transform; Z-score is undefined")]
    DegenerateColumn(String),

    /// An operation that needs at least one column received none.
    #[error("No columns selected for {0}")]
    EmptySelection(&'static str),

    /// An operation that requires complete data found missing values.
    #[error("Column '{column}' contains {count} missing values")]
    MissingValues { column: String, count: usize },

    /// A numeric parameter is outside its valid range.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Loading a delimited text file failed.
    #[error("Failed to load '{path}': {reason}")]
    Load { path: String, reason: String },

    /// PCA fitting failed.
    #[error("PCA failed: {0}")]
    Pca(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with added context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PrepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for callers that display errors.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownColumn(_) => "UNKNOWN_COLUMN",
            Self::InvalidColumnType { .. } => "INVALID_COLUMN_TYPE",
            Self::EmptyColumn(_) => "EMPTY_COLUMN",
            Self::DegenerateColumn(_) => "DEGENERATE_COLUMN",
            Self::EmptySelection(_) => "EMPTY_SELECTION",
            Self::MissingValues { .. } => "MISSING_VALUES",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::Load { .. } => "LOAD_ERROR",
            Self::Pca(_) => "PCA_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True for errors caused by the caller's column selection.
    pub fn is_selection_error(&self) -> bool {
        match self {
            Self::UnknownColumn(_) | Self::InvalidColumnType { .. } | Self::EmptySelection(_) => {
                true
            }
            Self::WithContext { source, .. } => source.is_selection_error(),
            _ => false,
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl Serialize for PrepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PrepError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preprocessing operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Polars(e).with_context(context))
    }
}
