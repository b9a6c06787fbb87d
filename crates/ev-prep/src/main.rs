//! CLI entry point for the EV statistics preprocessing tools.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ev_prep::io::{CsvOptions, TextEncoding, load_csv, save_csv};
use ev_prep::{
    Aggregation, DataCleaner, DataProfiler, FeatureBuilder, ImputationOrder, ImputationPolicy,
    Imputer, OutlierPolicy, PcaAnalysis, Pipeline, PrepConfig, ReportWriter, ScalingMethod,
};
use polars::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// CLI-compatible text encoding enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEncoding {
    Utf8,
    Latin1,
}

impl From<CliEncoding> for TextEncoding {
    fn from(cli: CliEncoding) -> Self {
        match cli {
            CliEncoding::Utf8 => TextEncoding::Utf8,
            CliEncoding::Latin1 => TextEncoding::Latin1,
        }
    }
}

/// CLI-compatible imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliImputation {
    /// Replace missing values with the column mean
    Mean,
    /// Round-robin regression imputation
    Iterative,
}

/// CLI-compatible column visiting order for iterative imputation
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOrder {
    Ascending,
    Roman,
    Random,
}

impl From<CliOrder> for ImputationOrder {
    fn from(cli: CliOrder) -> Self {
        match cli {
            CliOrder::Ascending => ImputationOrder::Ascending,
            CliOrder::Roman => ImputationOrder::Roman,
            CliOrder::Random => ImputationOrder::Random,
        }
    }
}

/// CLI-compatible outlier policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutliers {
    /// Interquartile-range fences
    Iqr,
    /// Z-score of the natural log
    ZscoreLog,
}

/// CLI-compatible scaling method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScaling {
    MinMax,
    Standard,
}

impl From<CliScaling> for ScalingMethod {
    fn from(cli: CliScaling) -> Self {
        match cli {
            CliScaling::MinMax => ScalingMethod::MinMax,
            CliScaling::Standard => ScalingMethod::Standard,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Outlier filtering, imputation and exploratory analysis for EV statistics",
    long_about = "Preprocessing and exploratory analysis for tabular EV statistics.\n\n\
                  EXAMPLES:\n  \
                  # Mean-impute, drop IQR outliers and min-max scale two columns\n  \
                  ev-prep process -i ev.csv --encoding latin1 --columns price,range_km \\\n    \
                  --impute mean --outliers iqr --scale min-max\n\n  \
                  # Summary statistics and outlier columns\n  \
                  ev-prep describe -i ev.csv\n\n  \
                  # Two principal components, scores labelled by region\n  \
                  ev-prep pca -i clean.csv --components 2 --label region"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON to stdout; disables logging
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Path to the CSV file to read
    #[arg(short, long)]
    input: PathBuf,

    /// Text encoding of the input file
    #[arg(long, value_enum, default_value = "utf8")]
    encoding: CliEncoding,

    /// Field delimiter
    #[arg(long, default_value = ",")]
    delimiter: char,
}

impl InputArgs {
    fn load(&self) -> Result<DataFrame> {
        let options = CsvOptions::default()
            .with_encoding(self.encoding.into())
            .with_delimiter(delimiter_byte(self.delimiter)?);
        load_csv(&self.input, &options).with_context(|| format!("loading {}", self.input.display()))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Impute, filter outliers and scale, then write the table and a report
    Process(ProcessArgs),
    /// Summary statistics, missing counts and outlier columns
    Describe {
        #[command(flatten)]
        input: InputArgs,

        /// Append log and log Z-score columns for these columns and write the
        /// table to this path
        #[arg(long, requires = "annotate_columns")]
        annotate_output: Option<PathBuf>,

        /// Columns to annotate with log Z-scores
        #[arg(long, value_delimiter = ',')]
        annotate_columns: Vec<String>,
    },
    /// Principal component analysis
    Pca {
        #[command(flatten)]
        input: InputArgs,

        /// Columns to analyse (default: all numeric)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Number of components to keep
        #[arg(long, default_value = "2")]
        components: usize,

        /// Column copied next to the scores, e.g. region
        #[arg(long)]
        label: Option<String>,

        /// Write the per-row scores to this CSV path
        #[arg(long)]
        scores: Option<PathBuf>,
    },
    /// Group-by aggregation
    Aggregate {
        #[command(flatten)]
        input: InputArgs,

        /// Grouping columns
        #[arg(long, value_delimiter = ',', required = true)]
        by: Vec<String>,

        /// Columns to sum
        #[arg(long, value_delimiter = ',')]
        sum: Vec<String>,

        /// Columns to average
        #[arg(long, value_delimiter = ',')]
        mean: Vec<String>,

        /// Columns to count (non-missing values)
        #[arg(long, value_delimiter = ',')]
        count: Vec<String>,

        /// Write the aggregated table to this CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Hide a fraction of known values, impute them and compare
    Evaluate {
        #[command(flatten)]
        input: InputArgs,

        /// Columns to mask and impute
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Fraction of observed values to hide per column
        #[arg(long, default_value = "0.2")]
        fraction: f64,

        #[arg(long, value_enum, default_value = "iterative")]
        impute: CliImputation,

        /// Seed for masking and iterative imputation
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Restrict to rows where this column equals --where-value
        #[arg(long, requires = "where_value")]
        where_column: Option<String>,

        #[arg(long)]
        where_value: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ProcessArgs {
    #[command(flatten)]
    input: InputArgs,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Columns to transform (default: all numeric)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Imputation strategy
    #[arg(long, value_enum)]
    impute: Option<CliImputation>,

    /// Iterations for iterative imputation
    #[arg(long, default_value = "10")]
    max_iterations: usize,

    /// Seed for iterative imputation
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Column visiting order for iterative imputation
    #[arg(long, value_enum, default_value = "ascending")]
    order: CliOrder,

    /// Outlier policy
    #[arg(long, value_enum)]
    outliers: Option<CliOutliers>,

    /// IQR fence multiplier
    #[arg(long, default_value = "1.5")]
    iqr_multiplier: f64,

    /// Absolute Z-score threshold in log space
    #[arg(long, default_value = "3.0")]
    zscore_threshold: f64,

    /// Scaling method
    #[arg(long, value_enum)]
    scale: Option<CliScaling>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file name (without extension)
    #[arg(long)]
    output_name: Option<String>,

    /// Also write <output_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    match cli.command {
        Command::Process(args) => run_process(args, cli.json),
        Command::Describe {
            input,
            annotate_output,
            annotate_columns,
        } => run_describe(&input, annotate_output, &annotate_columns, cli.json),
        Command::Pca {
            input,
            columns,
            components,
            label,
            scores,
        } => run_pca(&input, &columns, components, label.as_deref(), scores, cli.json),
        Command::Aggregate {
            input,
            by,
            sum,
            mean,
            count,
            output,
        } => {
            let aggregations: Vec<Aggregation> = sum
                .into_iter()
                .map(Aggregation::sum)
                .chain(mean.into_iter().map(Aggregation::mean))
                .chain(count.into_iter().map(Aggregation::count))
                .collect();
            run_aggregate(&input, &by, &aggregations, output, cli.json)
        }
        Command::Evaluate {
            input,
            columns,
            fraction,
            impute,
            seed,
            where_column,
            where_value,
        } => {
            let filter = where_column.zip(where_value);
            run_evaluate(&input, &columns, fraction, impute, seed, filter, cli.json)
        }
    }
}

fn run_process(args: ProcessArgs, json: bool) -> Result<()> {
    let config = build_config(&args)?;
    debug!("Effective configuration: {:?}", config);

    let data = args.input.load()?;
    let pipeline = Pipeline::builder().config(config).build()?;
    let mut result = pipeline.process(data)?;
    result.report.input_file = Some(args.input.input.display().to_string());

    let (table_path, report_path) = if args.emit_report {
        let (table, report) = pipeline.save(&mut result)?;
        (table, Some(report))
    } else {
        let writer = ReportWriter::new(&pipeline.config().output_dir);
        let table = writer.write_table(
            &result.data,
            pipeline.config().output_stem(),
            delimiter_byte(pipeline.config().delimiter)?,
        )?;
        result.report.output_file = Some(table.display().to_string());
        (table, None)
    };

    if json {
        return print_json(&result.report);
    }

    let report = &result.report;
    println!();
    println!("{}", "=".repeat(60));
    println!("PROCESSING COMPLETE");
    println!("{}", "=".repeat(60));
    println!(
        "  Rows: {} -> {} ({} removed)",
        report.original_shape.0, report.final_shape.0, report.rows_removed
    );
    println!("  Columns: {}", report.columns.join(", "));
    for step in &report.processing_steps {
        println!("  - {}", step);
    }
    if let Some(outliers) = &report.outliers {
        for name in &outliers.degenerate_columns {
            println!("  ! '{}' has zero variance in log space; all rows failed", name);
        }
    }
    println!("  Output: {}", table_path.display());
    if let Some(path) = report_path {
        println!("  Report: {}", path.display());
    }
    println!("{}", "=".repeat(60));
    Ok(())
}

/// Merge the optional config file with command-line flags.
fn build_config(args: &ProcessArgs) -> Result<PrepConfig> {
    let mut config = match &args.config {
        Some(path) => PrepConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PrepConfig::default(),
    };

    if !args.columns.is_empty() {
        config.columns = args.columns.clone();
    }
    if let Some(impute) = args.impute {
        config.imputation = Some(match impute {
            CliImputation::Mean => ImputationPolicy::MeanFill,
            CliImputation::Iterative => ImputationPolicy::IterativeFill {
                max_iterations: args.max_iterations,
                seed: args.seed,
                order: args.order.into(),
                ridge_alpha: ev_prep::config::DEFAULT_RIDGE_ALPHA,
                tolerance: None,
            },
        });
    }
    if let Some(outliers) = args.outliers {
        config.outliers = Some(match outliers {
            CliOutliers::Iqr => OutlierPolicy::Iqr {
                multiplier: args.iqr_multiplier,
            },
            CliOutliers::ZscoreLog => OutlierPolicy::ZScoreLog {
                threshold: args.zscore_threshold,
            },
        });
    }
    if let Some(scale) = args.scale {
        config.scaling = Some(scale.into());
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(name) = &args.output_name {
        config.output_name = Some(name.clone());
    }
    config.encoding = args.input.encoding.into();
    config.delimiter = args.input.delimiter;

    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn run_describe(
    input: &InputArgs,
    annotate_output: Option<PathBuf>,
    annotate_columns: &[String],
    json: bool,
) -> Result<()> {
    let data = input.load()?;
    let profile = DataProfiler::describe(&data)?;

    if let Some(path) = annotate_output {
        let annotated = ev_prep::OutlierFilter::annotate_log_zscores(&data, annotate_columns)?;
        save_csv(&annotated, &path)?;
        info!("Annotated table written to {}", path.display());
    }

    if json {
        return print_json(&profile);
    }

    println!();
    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", input.input.display());
    println!("  Rows: {}", profile.shape.0);
    println!("  Columns: {}", profile.shape.1);
    println!("  Missing cells: {}", profile.total_missing());
    println!();

    println!("NUMERIC COLUMNS");
    println!(
        "{:<20} {:>7} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Column", "Count", "Missing", "Mean", "Std", "Min", "Median", "Max"
    );
    println!("{}", "-".repeat(102));
    for s in &profile.numeric {
        println!(
            "{:<20} {:>7} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12}",
            truncate_str(&s.name, 19),
            s.count,
            s.missing,
            fmt_stat(s.mean),
            fmt_stat(s.std),
            fmt_stat(s.min),
            fmt_stat(s.median),
            fmt_stat(s.max)
        );
    }
    println!();

    println!("MISSING VALUES");
    for m in profile.missing.iter().filter(|m| m.missing > 0) {
        println!("  {:<20} {:<10} {}", truncate_str(&m.name, 19), m.dtype, m.missing);
    }
    println!();

    if profile.outlier_columns.is_empty() {
        println!("No IQR outliers found");
    } else {
        println!("Columns with IQR outliers: {}", profile.outlier_columns.join(", "));
    }
    Ok(())
}

fn run_pca(
    input: &InputArgs,
    columns: &[String],
    components: usize,
    label: Option<&str>,
    scores_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let data = input.load()?;
    let columns = if columns.is_empty() {
        ev_prep::utils::numeric_column_names(&data)
    } else {
        columns.to_vec()
    };
    let result = PcaAnalysis::fit(&data, &columns, components)?;

    if let Some(path) = scores_path {
        let scores = match label {
            Some(label) => result.scores_with_label(&data, label)?,
            None => result.scores.clone(),
        };
        save_csv(&scores, &path)?;
        info!("Scores written to {}", path.display());
    }

    if json {
        return print_json(&result.summary());
    }

    println!();
    println!("EXPLAINED VARIANCE");
    for (k, (ratio, cumulative)) in result
        .explained_variance_ratio
        .iter()
        .zip(&result.cumulative_variance)
        .enumerate()
    {
        println!(
            "  PC{:<3} {:>7.2}%   cumulative {:>7.2}%",
            k + 1,
            ratio * 100.0,
            cumulative * 100.0
        );
    }
    println!();
    println!("LOADINGS");
    for (k, component) in result.components.iter().enumerate() {
        println!("  PC{}", k + 1);
        for (name, weight) in result.columns.iter().zip(component) {
            println!("    {:<20} {:>8.4}", truncate_str(name, 19), weight);
        }
    }
    Ok(())
}

fn run_aggregate(
    input: &InputArgs,
    by: &[String],
    aggregations: &[Aggregation],
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let data = input.load()?;
    let result = FeatureBuilder::aggregate(&data, by, aggregations)?;

    if let Some(path) = output {
        save_csv(&result, &path)?;
        info!("Aggregated table written to {}", path.display());
    }

    if json {
        return print_json(&frame_to_json(&result)?);
    }

    println!("{}", result);
    Ok(())
}

fn run_evaluate(
    input: &InputArgs,
    columns: &[String],
    fraction: f64,
    impute: CliImputation,
    seed: u64,
    filter: Option<(String, String)>,
    json: bool,
) -> Result<()> {
    let mut data = input.load()?;
    if let Some((column, value)) = &filter {
        data = DataCleaner::rows_where_equal(&data, column, value)?;
        info!("{} rows where {} = {}", data.height(), column, value);
    }

    let policy = match impute {
        CliImputation::Mean => ImputationPolicy::MeanFill,
        CliImputation::Iterative => ImputationPolicy::iterative(10, seed),
    };
    let comparisons = Imputer::evaluate(&data, columns, fraction, policy, seed)?;

    if json {
        return print_json(&comparisons);
    }

    println!();
    println!(
        "{:<20} {:>7} {:>14} {:>14} {:>12} {:>12}",
        "Column", "Masked", "Original mean", "Imputed mean", "Difference", "MAE"
    );
    println!("{}", "-".repeat(84));
    for c in &comparisons {
        println!(
            "{:<20} {:>7} {:>14} {:>14} {:>12} {:>12}",
            truncate_str(&c.name, 19),
            c.masked,
            fmt_stat(c.original_mean),
            fmt_stat(c.imputed_mean),
            fmt_stat(c.mean_difference()),
            fmt_stat(c.mae)
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Column-oriented JSON view of a table: numeric columns as numbers, the rest
/// as strings.
fn frame_to_json(df: &DataFrame) -> Result<serde_json::Value> {
    let mut object = serde_json::Map::new();
    for column in df.get_columns() {
        let name = column.name().to_string();
        let values = if ev_prep::utils::is_numeric_dtype(column.dtype()) {
            serde_json::to_value(ev_prep::utils::column_values(df, &name)?)?
        } else {
            let text = column.cast(&DataType::String)?;
            let strings: Vec<Option<String>> = text
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect();
            serde_json::to_value(strings)?
        };
        object.insert(name, values);
    }
    Ok(serde_json::Value::Object(object))
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter).map_err(|_| anyhow!("Delimiter {:?} is not a single byte", delimiter))
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Truncate a string to at most `max_len` characters, adding "..." when cut.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
