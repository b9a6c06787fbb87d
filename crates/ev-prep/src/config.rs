//! Configuration types for the preprocessing pipeline.
//!
//! The transformation policies are tagged enums so one implementation serves
//! every call site. [`PrepConfig`] bundles them for [`Pipeline`](crate::Pipeline)
//! and is built with [`PrepConfig::builder()`] or loaded from JSON.

use crate::error::{PrepError, Result};
use crate::io::TextEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default IQR multiplier (Tukey fences).
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
/// Default absolute Z-score threshold.
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;
/// Default iteration count for iterative imputation.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
/// Default ridge penalty for iterative imputation.
pub const DEFAULT_RIDGE_ALPHA: f64 = 1e-3;

/// Policy for deciding which rows are outliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// Keep values within `[Q1 - k*IQR, Q3 + k*IQR]`.
    Iqr {
        #[serde(default = "default_iqr_multiplier")]
        multiplier: f64,
    },
    /// Keep values whose log-space Z-score is within `threshold`.
    ZScoreLog {
        #[serde(default = "default_zscore_threshold")]
        threshold: f64,
    },
}

impl OutlierPolicy {
    /// IQR policy with the default multiplier of 1.5.
    pub fn iqr() -> Self {
        Self::Iqr {
            multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }

    /// Z-score-on-log policy with the default threshold of 3.
    pub fn zscore_log() -> Self {
        Self::ZScoreLog {
            threshold: DEFAULT_ZSCORE_THRESHOLD,
        }
    }

    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Iqr { .. } => "iqr",
            Self::ZScoreLog { .. } => "zscore_log",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            Self::Iqr { multiplier } if !(multiplier.is_finite() && multiplier >= 0.0) => Err(
                PrepError::invalid_parameter("multiplier", format!("{multiplier} must be >= 0")),
            ),
            Self::ZScoreLog { threshold } if !(threshold.is_finite() && threshold > 0.0) => Err(
                PrepError::invalid_parameter("threshold", format!("{threshold} must be > 0")),
            ),
            _ => Ok(()),
        }
    }
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        Self::iqr()
    }
}

/// Order in which the iterative imputer visits columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImputationOrder {
    /// Fewest missing values first.
    #[default]
    Ascending,
    /// Left to right as selected.
    Roman,
    /// Shuffled each iteration with the policy seed.
    Random,
}

/// Policy for filling missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImputationPolicy {
    /// Replace missing values with the column mean.
    #[default]
    MeanFill,
    /// Round-robin regression imputation (MICE-style).
    IterativeFill {
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
        #[serde(default)]
        seed: u64,
        #[serde(default)]
        order: ImputationOrder,
        #[serde(default = "default_ridge_alpha")]
        ridge_alpha: f64,
        /// Optional early stop on relative change; `None` runs every iteration.
        #[serde(default)]
        tolerance: Option<f64>,
    },
}

impl ImputationPolicy {
    /// Iterative policy with the given iteration count and seed, other knobs at
    /// their defaults.
    pub fn iterative(max_iterations: usize, seed: u64) -> Self {
        Self::IterativeFill {
            max_iterations,
            seed,
            order: ImputationOrder::default(),
            ridge_alpha: DEFAULT_RIDGE_ALPHA,
            tolerance: None,
        }
    }

    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MeanFill => "mean",
            Self::IterativeFill { .. } => "iterative",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Self::IterativeFill {
            max_iterations,
            ridge_alpha,
            tolerance,
            ..
        } = *self
        {
            if max_iterations == 0 {
                return Err(PrepError::invalid_parameter(
                    "max_iterations",
                    "must be at least 1",
                ));
            }
            if !(ridge_alpha.is_finite() && ridge_alpha >= 0.0) {
                return Err(PrepError::invalid_parameter(
                    "ridge_alpha",
                    format!("{ridge_alpha} must be >= 0"),
                ));
            }
            if let Some(tol) = tolerance
                && !(tol.is_finite() && tol > 0.0)
            {
                return Err(PrepError::invalid_parameter(
                    "tolerance",
                    format!("{tol} must be > 0"),
                ));
            }
        }
        Ok(())
    }
}

/// Feature scaling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// Map each column onto `[0, 1]`.
    MinMax,
    /// Zero mean, unit (population) variance.
    Standard,
}

fn default_iqr_multiplier() -> f64 {
    DEFAULT_IQR_MULTIPLIER
}

fn default_zscore_threshold() -> f64 {
    DEFAULT_ZSCORE_THRESHOLD
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_ridge_alpha() -> f64 {
    DEFAULT_RIDGE_ALPHA
}

/// Configuration for the preprocessing pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use ev_prep::config::{PrepConfig, OutlierPolicy, ImputationPolicy};
///
/// let config = PrepConfig::builder()
///     .columns(["price", "range_km"])
///     .imputation(ImputationPolicy::MeanFill)
///     .outliers(OutlierPolicy::iqr())
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Columns to transform. Empty means every numeric column.
    pub columns: Vec<String>,

    /// Imputation step; `None` skips it.
    pub imputation: Option<ImputationPolicy>,

    /// Outlier filtering step; `None` skips it.
    pub outliers: Option<OutlierPolicy>,

    /// Scaling step; `None` skips it.
    pub scaling: Option<ScalingMethod>,

    /// Encoding used when loading input files.
    pub encoding: TextEncoding,

    /// Field delimiter for input and output files.
    pub delimiter: char,

    /// Output directory for the cleaned table and report.
    pub output_dir: PathBuf,

    /// Output file stem. Default: "processed".
    pub output_name: Option<String>,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            imputation: None,
            outliers: None,
            scaling: None,
            encoding: TextEncoding::default(),
            delimiter: ',',
            output_dir: PathBuf::from("output"),
            output_name: None,
        }
    }
}

impl PrepConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PrepConfigBuilder {
        PrepConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PrepConfig = serde_json::from_str(&text)?;
        config
            .validate()
            .map_err(|e| PrepError::invalid_parameter("config", e.to_string()))?;
        Ok(config)
    }

    /// Output file stem, falling back to "processed".
    pub fn output_stem(&self) -> &str {
        self.output_name.as_deref().unwrap_or("processed")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if let Some(policy) = &self.outliers {
            policy
                .validate()
                .map_err(|e| ConfigValidationError::InvalidPolicy(e.to_string()))?;
        }
        if let Some(policy) = &self.imputation {
            policy
                .validate()
                .map_err(|e| ConfigValidationError::InvalidPolicy(e.to_string()))?;
        }
        if !self.delimiter.is_ascii() || self.delimiter == '\n' || self.delimiter == '"' {
            return Err(ConfigValidationError::InvalidDelimiter(self.delimiter));
        }
        if let Some(dup) = first_duplicate(&self.columns) {
            return Err(ConfigValidationError::DuplicateColumn(dup.to_string()));
        }
        Ok(())
    }
}

fn first_duplicate(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .enumerate()
        .find(|(i, c)| columns[..*i].contains(c))
        .map(|(_, c)| c.as_str())
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid delimiter {0:?} (must be a single ASCII character other than newline or quote)")]
    InvalidDelimiter(char),

    #[error("Column '{0}' selected more than once")]
    DuplicateColumn(String),
}

/// Builder for [`PrepConfig`].
#[derive(Debug, Default)]
pub struct PrepConfigBuilder {
    columns: Option<Vec<String>>,
    imputation: Option<ImputationPolicy>,
    outliers: Option<OutlierPolicy>,
    scaling: Option<ScalingMethod>,
    encoding: Option<TextEncoding>,
    delimiter: Option<char>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
}

impl PrepConfigBuilder {
    /// Restrict the transformations to these columns.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Enable imputation with the given policy.
    pub fn imputation(mut self, policy: ImputationPolicy) -> Self {
        self.imputation = Some(policy);
        self
    }

    /// Enable outlier filtering with the given policy.
    pub fn outliers(mut self, policy: OutlierPolicy) -> Self {
        self.outliers = Some(policy);
        self
    }

    /// Enable scaling with the given method.
    pub fn scaling(mut self, method: ScalingMethod) -> Self {
        self.scaling = Some(method);
        self
    }

    /// Set the input text encoding.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the field delimiter.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Set the output directory.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the output file stem (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> std::result::Result<PrepConfig, ConfigValidationError> {
        let defaults = PrepConfig::default();
        let config = PrepConfig {
            columns: self.columns.unwrap_or(defaults.columns),
            imputation: self.imputation,
            outliers: self.outliers,
            scaling: self.scaling,
            encoding: self.encoding.unwrap_or(defaults.encoding),
            delimiter: self.delimiter.unwrap_or(defaults.delimiter),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            output_name: self.output_name,
        };

        config.validate()?;
        Ok(config)
    }
}
