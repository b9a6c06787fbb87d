//! Processing reports and output files.
//!
//! [`ProcessingReport`] records what a [`Pipeline`](crate::Pipeline) run did and
//! serializes to JSON for the `--json` CLI flag or a report file.
//! [`ReportWriter`] places reports and cleaned tables in an output directory.

use crate::config::{ImputationPolicy, OutlierPolicy, ScalingMethod};
use crate::error::Result;
use crate::io::save_csv_with_delimiter;
use crate::types::{ColumnFilterReport, ImputationChange};
use chrono::Local;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Summary of the imputation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationSummary {
    pub policy: ImputationPolicy,
    pub iterations: Option<usize>,
    pub total_filled: usize,
    pub columns: Vec<ImputationChange>,
}

/// Summary of the outlier filtering step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub policy: OutlierPolicy,
    pub rows_removed: usize,
    pub columns: Vec<ColumnFilterReport>,
    /// Columns with zero variance in log space; every row failed retention.
    pub degenerate_columns: Vec<String>,
}

/// Report of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    /// Local time the report was generated.
    pub generated_at: String,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub duration_ms: u64,
    pub columns: Vec<String>,
    pub original_shape: (usize, usize),
    pub final_shape: (usize, usize),
    pub rows_removed: usize,
    pub imputation: Option<ImputationSummary>,
    pub outliers: Option<OutlierSummary>,
    pub scaling: Option<ScalingMethod>,
    /// Human-readable log of the steps taken, in order.
    pub processing_steps: Vec<String>,
}

impl ProcessingReport {
    /// Start a report for a table of the given shape.
    pub fn new(columns: Vec<String>, original_shape: (usize, usize)) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: None,
            output_file: None,
            duration_ms: 0,
            columns,
            original_shape,
            final_shape: original_shape,
            rows_removed: 0,
            imputation: None,
            outliers: None,
            scaling: None,
            processing_steps: Vec::new(),
        }
    }

    pub fn with_input_file(mut self, path: impl AsRef<Path>) -> Self {
        self.input_file = Some(path.as_ref().display().to_string());
        self
    }
}

/// Writes reports and tables into an output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<base_name>_report.json`.
    pub fn write_report(&self, report: &ProcessingReport, base_name: &str) -> Result<PathBuf> {
        self.write_json(report, &format!("{base_name}_report.json"))
    }

    /// Write any serializable value as pretty JSON to `file_name`.
    pub fn write_json<T: Serialize>(&self, value: &T, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join(file_name);
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }

    /// Write `<stem>.csv`.
    pub fn write_table(&self, df: &DataFrame, stem: &str, delimiter: u8) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{stem}.csv"));
        save_csv_with_delimiter(df, &path, delimiter)?;
        Ok(path)
    }
}
