//! Main preprocessing pipeline.
//!
//! This module provides the core `Pipeline` struct and builder. A run applies
//! the configured steps in a fixed order: imputation, then outlier filtering,
//! then scaling. Each step is optional.

use crate::config::PrepConfig;
use crate::error::{PrepError, Result, ResultExt};
use crate::imputers::Imputer;
use crate::io::{CsvOptions, load_csv};
use crate::outliers::OutlierFilter;
use crate::reporting::{ImputationSummary, OutlierSummary, ProcessingReport, ReportWriter};
use crate::scaling::Scaler;
use crate::utils::resolve_columns;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Output of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The processed table.
    pub data: DataFrame,
    pub report: ProcessingReport,
}

/// The main preprocessing pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use ev_prep::{Pipeline, PrepConfig, ImputationPolicy, OutlierPolicy};
///
/// let config = PrepConfig::builder()
///     .columns(["price", "range_km"])
///     .imputation(ImputationPolicy::MeanFill)
///     .outliers(OutlierPolicy::iqr())
///     .build()?;
///
/// let result = Pipeline::builder().config(config).build()?.process(dataframe)?;
/// println!("{} rows removed", result.report.rows_removed);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PrepConfig,
}

// Pipelines are handed to worker threads by callers that batch files
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// Process a table through the configured steps.
    pub fn process(&self, df: DataFrame) -> Result<PipelineResult> {
        self.process_internal(df).inspect_err(|e| error!("Pipeline error: {}", e))
    }

    /// Load a file with the configured encoding and delimiter, then process it.
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<PipelineResult> {
        let path = path.as_ref();
        let options = CsvOptions::default()
            .with_encoding(self.config.encoding)
            .with_delimiter(self.config.delimiter as u8);
        let df = load_csv(path, &options)?;

        let mut result = self.process(df)?;
        result.report.input_file = Some(path.display().to_string());
        Ok(result)
    }

    /// Write the processed table and its report into the configured output
    /// directory. Returns the table path and the report path.
    pub fn save(&self, result: &mut PipelineResult) -> Result<(PathBuf, PathBuf)> {
        let writer = ReportWriter::new(&self.config.output_dir);
        let stem = self.config.output_stem();

        let table_path = writer
            .write_table(&result.data, stem, self.config.delimiter as u8)
            .context("Failed to write processed table")?;
        result.report.output_file = Some(table_path.display().to_string());
        let report_path = writer.write_report(&result.report, stem)?;

        Ok((table_path, report_path))
    }

    fn process_internal(&self, df: DataFrame) -> Result<PipelineResult> {
        let start = Instant::now();
        let columns = resolve_columns(&df, &self.config.columns, "pipeline")?;
        info!(
            "Processing {} rows x {} columns ({} selected)",
            df.height(),
            df.width(),
            columns.len()
        );

        let mut report = ProcessingReport::new(columns.clone(), df.shape());
        let mut data = df;

        // Step 1: imputation
        if let Some(policy) = self.config.imputation {
            let outcome = Imputer::impute(&data, &columns, policy).context("Imputation failed")?;
            if let Some(err) = outcome.check_complete() {
                return Err(err.with_context("Imputation left missing values"));
            }
            report.processing_steps.push(format!(
                "Imputed {} missing values ({})",
                outcome.total_filled(),
                policy.name()
            ));
            report.imputation = Some(ImputationSummary {
                policy,
                iterations: outcome.iterations,
                total_filled: outcome.total_filled(),
                columns: outcome.changes,
            });
            data = outcome.data;
        }

        // Step 2: outlier filtering
        if let Some(policy) = self.config.outliers {
            let outcome =
                OutlierFilter::filter(&data, &columns, policy).context("Outlier filtering failed")?;
            let degenerate_columns: Vec<String> = outcome
                .diagnostics()
                .into_iter()
                .filter_map(|d| match d {
                    PrepError::DegenerateColumn(name) => Some(name),
                    _ => None,
                })
                .collect();
            for name in &degenerate_columns {
                warn!("Column '{}' is degenerate; every row was removed", name);
            }
            report.processing_steps.push(format!(
                "Removed {} outlier rows ({})",
                outcome.rows_removed,
                policy.name()
            ));
            report.outliers = Some(OutlierSummary {
                policy,
                rows_removed: outcome.rows_removed,
                columns: outcome.columns,
                degenerate_columns,
            });
            data = outcome.data;
        }

        // Step 3: scaling
        if let Some(method) = self.config.scaling {
            data = Scaler::scale(&data, &columns, method).context("Scaling failed")?;
            report
                .processing_steps
                .push(format!("Scaled {} columns ({:?})", columns.len(), method));
            report.scaling = Some(method);
        }

        if report.processing_steps.is_empty() {
            debug!("No steps configured; table passed through unchanged");
        }

        report.final_shape = data.shape();
        report.rows_removed = report.original_shape.0 - report.final_shape.0;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Pipeline finished in {} ms: {} -> {} rows",
            report.duration_ms, report.original_shape.0, report.final_shape.0
        );
        Ok(PipelineResult { data, report })
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: Option<PrepConfig>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PrepConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Validate the configuration and build the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| PrepError::invalid_parameter("config", e.to_string()))?;
        Ok(Pipeline { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImputationPolicy, OutlierPolicy, ScalingMethod};
    use crate::utils::column_values;
    use tempfile::TempDir;

    fn sample_df() -> DataFrame {
        df![
            "region" => ["Europe", "China", "USA", "India", "Europe", "China"],
            "price" => [Some(10.0), None, Some(12.0), Some(11.0), Some(13.0), Some(400.0)],
            "range_km" => [300.0, 310.0, 320.0, 305.0, 315.0, 312.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_empty_pipeline_passes_through() {
        let df = sample_df();
        let result = Pipeline::builder().build().unwrap().process(df.clone()).unwrap();

        assert!(result.data.equals_missing(&df));
        assert!(result.report.processing_steps.is_empty());
        assert_eq!(result.report.rows_removed, 0);
    }

    #[test]
    fn test_full_pipeline() {
        let config = PrepConfig::builder()
            .columns(["price"])
            .imputation(ImputationPolicy::MeanFill)
            .outliers(OutlierPolicy::iqr())
            .scaling(ScalingMethod::MinMax)
            .build()
            .unwrap();

        let result = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .process(sample_df())
            .unwrap();

        // Mean of observed price is 89.2, the 400 row is an outlier
        assert_eq!(result.report.rows_removed, 1);
        assert_eq!(result.data.height(), 5);
        assert_eq!(result.report.processing_steps.len(), 3);
        let imputation = result.report.imputation.as_ref().unwrap();
        assert_eq!(imputation.total_filled, 1);

        let price = column_values(&result.data, "price").unwrap();
        assert!(price.iter().all(|v| v.is_some_and(|x| (0.0..=1.0).contains(&x))));
        assert_eq!(result.data.width(), 3);
    }

    #[test]
    fn test_pipeline_without_imputation_drops_missing_rows() {
        let config = PrepConfig::builder()
            .columns(["price"])
            .outliers(OutlierPolicy::iqr())
            .build()
            .unwrap();

        let result = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .process(sample_df())
            .unwrap();

        assert_eq!(result.data.height(), 4);
    }

    #[test]
    fn test_degenerate_column_reported() {
        let df = df!["c" => [5.0, 5.0, 5.0]].unwrap();
        let config = PrepConfig::builder()
            .outliers(OutlierPolicy::zscore_log())
            .build()
            .unwrap();

        let result = Pipeline::builder().config(config).build().unwrap().process(df).unwrap();

        let outliers = result.report.outliers.unwrap();
        assert_eq!(outliers.degenerate_columns, vec!["c"]);
        assert_eq!(result.data.height(), 0);
    }

    #[test]
    fn test_unknown_column_is_selection_error() {
        let config = PrepConfig::builder()
            .columns(["battery"])
            .imputation(ImputationPolicy::MeanFill)
            .build()
            .unwrap();

        let err = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .process(sample_df())
            .unwrap_err();
        assert!(err.is_selection_error());
    }

    #[test]
    fn test_save_writes_table_and_report() {
        let dir = TempDir::new().unwrap();
        let config = PrepConfig::builder()
            .imputation(ImputationPolicy::MeanFill)
            .output_dir(dir.path())
            .output_name("ev")
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();

        let mut result = pipeline.process(sample_df()).unwrap();
        let (table, report) = pipeline.save(&mut result).unwrap();

        assert!(table.ends_with("ev.csv"));
        assert!(report.ends_with("ev_report.json"));
        assert!(result.report.output_file.is_some());
    }
}
