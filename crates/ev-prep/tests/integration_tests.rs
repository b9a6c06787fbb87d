//! Integration tests for the EV preprocessing library.
//!
//! These tests drive the public API end to end against the CSV fixtures.

use ev_prep::io::{CsvOptions, TextEncoding, load_csv, save_csv};
use ev_prep::utils::column_values;
use ev_prep::{
    Aggregation, DataCleaner, DataProfiler, FeatureBuilder, ImputationPolicy, Imputer,
    OutlierFilter, OutlierPolicy, PcaAnalysis, Pipeline, PrepConfig, PrepError, ProcessingReport,
    ScalingMethod,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

const NUMERIC: [&str; 3] = ["ev_sales", "ev_stock", "charging_points"];

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_sample() -> DataFrame {
    load_csv(fixtures_path().join("ev_sample.csv"), &CsvOptions::default())
        .expect("Failed to read ev_sample.csv")
}

fn imputed_sample() -> DataFrame {
    Imputer::impute(&load_sample(), &NUMERIC, ImputationPolicy::MeanFill)
        .unwrap()
        .data
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_sample_fixture() {
    let df = load_sample();

    assert_eq!(df.shape(), (12, 6));
    let profile = DataProfiler::describe(&df).unwrap();
    assert_eq!(profile.total_missing(), 3);
    assert!(profile.outlier_columns.contains(&"ev_sales".to_string()));
}

#[test]
fn test_load_latin1_fixture() {
    let options = CsvOptions::default()
        .with_encoding(TextEncoding::Latin1)
        .with_delimiter(b';');
    let df = load_csv(fixtures_path().join("ev_latin1.csv"), &options).unwrap();

    assert_eq!(df.shape(), (4, 3));
    let latam = DataCleaner::rows_where_equal(&df, "region", "Amérique latine").unwrap();
    assert_eq!(latam.height(), 2);
    assert_eq!(column_values(&latam, "ev_sales").unwrap(), vec![Some(50.0), None]);
}

#[test]
fn test_latin1_fixture_rejected_as_utf8() {
    let options = CsvOptions::default().with_delimiter(b';');
    let err = load_csv(fixtures_path().join("ev_latin1.csv"), &options).unwrap_err();

    assert_eq!(err.error_code(), "LOAD_ERROR");
}

// ============================================================================
// Documented Scenarios
// ============================================================================

#[test]
fn test_scenario_iqr_removes_extreme_row() {
    let df = df!["x" => [1.0, 2.0, 3.0, 4.0, 100.0]].unwrap();

    let outcome = OutlierFilter::filter(&df, &["x"], OutlierPolicy::iqr()).unwrap();

    assert_eq!(outcome.data.height(), 4);
    assert_eq!(
        column_values(&outcome.data, "x").unwrap(),
        vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]
    );
}

#[test]
fn test_scenario_mean_fill() {
    let df = df!["y" => [Some(10.0), None, Some(30.0)]].unwrap();

    let outcome = Imputer::impute(&df, &["y"], ImputationPolicy::MeanFill).unwrap();

    assert_eq!(
        column_values(&outcome.data, "y").unwrap(),
        vec![Some(10.0), Some(20.0), Some(30.0)]
    );
}

#[test]
fn test_scenario_all_missing_column() {
    let df = df!["y" => [None::<f64>, None, None]].unwrap();

    let err = Imputer::impute(&df, &["y"], ImputationPolicy::MeanFill).unwrap_err();

    assert!(matches!(err, PrepError::EmptyColumn(ref name) if name == "y"));
}

#[test]
fn test_scenario_constant_column_zscore_log() {
    let df = df!["c" => [5.0, 5.0, 5.0, 5.0]].unwrap();

    let outcome = OutlierFilter::filter(&df, &["c"], OutlierPolicy::zscore_log()).unwrap();

    assert_eq!(outcome.data.height(), 0);
    assert_eq!(outcome.data.width(), 1);
    let diagnostics = outcome.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].error_code(), "DEGENERATE_COLUMN");
}

// ============================================================================
// Outlier Filter on the Fixture
// ============================================================================

#[test]
fn test_iqr_without_imputation_drops_missing_and_extreme_rows() {
    let df = load_sample();

    let outcome = OutlierFilter::filter(&df, &["ev_sales"], OutlierPolicy::iqr()).unwrap();

    // One missing value and the 20000 row fail
    assert_eq!(outcome.rows_removed, 2);
    assert_eq!(outcome.data.width(), df.width());
}

#[test]
fn test_zscore_log_keeps_all_observed_rows() {
    let df = load_sample();

    let outcome = OutlierFilter::filter(&df, &["ev_sales"], OutlierPolicy::zscore_log()).unwrap();

    assert_eq!(outcome.data.height(), 11);
    assert!(outcome.diagnostics().is_empty());
}

#[test]
fn test_filter_output_is_subset_in_order() {
    let df = imputed_sample();

    let outcome = OutlierFilter::filter(&df, &NUMERIC, OutlierPolicy::iqr()).unwrap();

    assert_eq!(outcome.data.height(), 9);
    let years = column_values(&outcome.data, "year").unwrap();
    let sales = column_values(&outcome.data, "ev_sales").unwrap();
    let original: Vec<(Option<f64>, Option<f64>)> = column_values(&df, "year")
        .unwrap()
        .into_iter()
        .zip(column_values(&df, "ev_sales").unwrap())
        .collect();

    let mut cursor = 0;
    for pair in years.into_iter().zip(sales) {
        let found = original[cursor..].iter().position(|row| *row == pair);
        assert!(found.is_some(), "row {pair:?} not found in order");
        cursor += found.unwrap_or(0) + 1;
    }
}

#[test]
fn test_filter_until_stable_is_fixed_point() {
    let df = imputed_sample();

    let stable = OutlierFilter::filter_until_stable(&df, &NUMERIC, OutlierPolicy::iqr(), 10).unwrap();
    let again = OutlierFilter::filter(&stable.data, &NUMERIC, OutlierPolicy::iqr()).unwrap();

    assert_eq!(stable.rows_before, 12);
    assert_eq!(stable.data.height(), 7);
    assert_eq!(again.rows_removed, 0);
}

// ============================================================================
// Imputation on the Fixture
// ============================================================================

#[test]
fn test_mean_fill_is_total_and_preserves_means() {
    let df = load_sample();

    let outcome = Imputer::impute(&df, &NUMERIC, ImputationPolicy::MeanFill).unwrap();

    assert_eq!(outcome.total_filled(), 3);
    assert!(outcome.check_complete().is_none());
    for change in &outcome.changes {
        assert_close(change.after.mean.unwrap(), change.before.mean.unwrap());
    }
    assert_close(outcome.changes[0].after.mean.unwrap(), 2225.0);

    // Unselected columns are untouched
    assert!(
        outcome
            .data
            .column("region")
            .unwrap()
            .equals_missing(df.column("region").unwrap())
    );
}

#[test]
fn test_iterative_fill_is_total_and_deterministic() {
    let df = load_sample();
    let policy = ImputationPolicy::iterative(10, 42);

    let first = Imputer::impute(&df, &NUMERIC, policy).unwrap();
    let second = Imputer::impute(&df, &NUMERIC, policy).unwrap();

    assert!(first.check_complete().is_none());
    assert!(first.data.equals_missing(&second.data));
    assert_eq!(first.data.shape(), df.shape());
    assert!(first.iterations.is_some_and(|n| n >= 1));

    // Observed values are never rewritten
    let before = column_values(&df, "ev_stock").unwrap();
    let after = column_values(&first.data, "ev_stock").unwrap();
    for (b, a) in before.iter().zip(&after) {
        if b.is_some() {
            assert_eq!(b, a);
        }
    }
}

#[test]
fn test_imputation_selection_errors() {
    let df = load_sample();

    let unknown = Imputer::impute(&df, &["battery"], ImputationPolicy::MeanFill).unwrap_err();
    assert_eq!(unknown.error_code(), "UNKNOWN_COLUMN");

    let text = Imputer::impute(&df, &["region"], ImputationPolicy::MeanFill).unwrap_err();
    assert_eq!(text.error_code(), "INVALID_COLUMN_TYPE");
}

#[test]
fn test_evaluate_masks_requested_fraction() {
    let df = load_sample();

    let comparisons = Imputer::evaluate(
        &df,
        &["ev_stock", "charging_points"],
        0.25,
        ImputationPolicy::MeanFill,
        7,
    )
    .unwrap();

    assert_eq!(comparisons.len(), 2);
    for comparison in &comparisons {
        // round(0.25 * 11 observed)
        assert_eq!(comparison.masked, 3);
        assert!(comparison.mae.is_some_and(|mae| mae >= 0.0));
        assert!(comparison.mean_difference().is_some());
    }
}

// ============================================================================
// Analysis Operations
// ============================================================================

#[test]
fn test_pca_on_imputed_fixture() {
    let df = imputed_sample();

    let result = PcaAnalysis::fit(&df, &NUMERIC, 3).unwrap();

    assert_eq!(result.scores.shape(), (12, 3));
    assert_close(*result.cumulative_variance.last().unwrap(), 1.0);
    assert!(
        result
            .explained_variance_ratio
            .windows(2)
            .all(|w| w[0] >= w[1])
    );
    let labelled = result.scores_with_label(&df, "region").unwrap();
    assert_eq!(labelled.width(), 4);
}

#[test]
fn test_pca_rejects_missing_values() {
    let err = PcaAnalysis::fit(&load_sample(), &NUMERIC, 2).unwrap_err();
    assert_eq!(err.error_code(), "MISSING_VALUES");
}

#[test]
fn test_aggregate_sales_by_region() {
    let df = load_sample();

    let result = FeatureBuilder::aggregate(&df, &["region"], &[Aggregation::sum("ev_sales")]).unwrap();

    let regions: Vec<Option<&str>> = result
        .column("region")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(
        regions,
        vec![Some("China"), Some("Europe"), Some("India"), Some("Norway"), Some("USA")]
    );
    assert_eq!(
        column_values(&result, "ev_sales_sum").unwrap(),
        vec![Some(3300.0), Some(450.0), Some(25.0), Some(70.0), Some(20630.0)]
    );
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_pipeline_mean_fill_then_iqr() {
    let config = PrepConfig::builder()
        .columns(NUMERIC)
        .imputation(ImputationPolicy::MeanFill)
        .outliers(OutlierPolicy::iqr())
        .build()
        .unwrap();

    let result = Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .process(load_sample())
        .unwrap();

    assert_eq!(result.report.original_shape, (12, 6));
    assert_eq!(result.report.final_shape, (9, 6));
    assert_eq!(result.report.rows_removed, 3);
    assert_eq!(result.report.imputation.as_ref().unwrap().total_filled, 3);
}

#[test]
fn test_pipeline_from_json_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    let output_dir = dir.path().join("out");
    let config_json = serde_json::json!({
        "columns": NUMERIC,
        "imputation": { "kind": "mean_fill" },
        "outliers": { "kind": "iqr", "multiplier": 1.5 },
        "scaling": "min_max",
        "output_dir": output_dir,
        "output_name": "ev_clean"
    });
    fs::write(&config_path, config_json.to_string()).unwrap();

    let config = PrepConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.scaling, Some(ScalingMethod::MinMax));
    let pipeline = Pipeline::builder().config(config).build().unwrap();

    let mut result = pipeline.process_file(fixtures_path().join("ev_sample.csv")).unwrap();
    let (table_path, report_path) = pipeline.save(&mut result).unwrap();

    let reloaded = load_csv(&table_path, &CsvOptions::default()).unwrap();
    assert_eq!(reloaded.shape(), (9, 6));
    for name in NUMERIC {
        let values = column_values(&reloaded, name).unwrap();
        assert!(values.iter().all(|v| v.is_some_and(|x| (0.0..=1.0).contains(&x))));
    }

    let report: ProcessingReport =
        serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert!(report.input_file.unwrap().ends_with("ev_sample.csv"));
    assert_eq!(report.processing_steps.len(), 3);
}

#[test]
fn test_pipeline_does_not_mutate_input() {
    let df = load_sample();
    let snapshot = df.clone();
    let config = PrepConfig::builder()
        .imputation(ImputationPolicy::MeanFill)
        .outliers(OutlierPolicy::zscore_log())
        .build()
        .unwrap();

    Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .process(df.clone())
        .unwrap();

    assert!(df.equals_missing(&snapshot));
}

#[test]
fn test_save_and_reload_cleaned_fixture() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clean.csv");
    let df = DataCleaner::drop_rows_with_missing(&load_sample()).unwrap();

    save_csv(&df, &path).unwrap();
    let reloaded = load_csv(&path, &CsvOptions::default()).unwrap();

    assert_eq!(reloaded.height(), 9);
    assert!(reloaded.equals_missing(&df));
}
