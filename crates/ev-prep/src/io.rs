//! Delimited text input and output.
//!
//! Files are decoded with a declared text encoding before parsing, so Latin-1
//! exports load the same way UTF-8 files do.
//!
//! Empty fields are missing in every column. Other null tokens such as `NA`
//! only count as missing in columns that are otherwise numeric, so text like
//! "NA" (North America) survives a save and reload.

use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info};

/// Tokens read as missing values by default. Apart from the empty field they
/// apply only to columns whose remaining values are all numbers.
pub const DEFAULT_NULL_VALUES: [&str; 4] = ["", "NA", "NaN", "null"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Text encoding of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte is one code point.
    Latin1,
}

impl TextEncoding {
    /// Decode raw bytes into UTF-8 text.
    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<String, String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to()))
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "utf8" => Ok(Self::Utf8),
            "latin1" | "iso88591" => Ok(Self::Latin1),
            other => Err(format!("unknown encoding '{other}' (expected utf8 or latin1)")),
        }
    }
}

/// Options for reading delimited text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
    pub encoding: TextEncoding,
    /// Tokens read as missing values (see [`DEFAULT_NULL_VALUES`]).
    pub null_values: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            encoding: TextEncoding::Utf8,
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CsvOptions {
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Load a delimited text file into a table.
///
/// # Errors
///
/// [`PrepError::Load`] if the file cannot be read, decoded or parsed.
pub fn load_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<DataFrame> {
    let path = path.as_ref();
    let load_error = |reason: String| PrepError::Load {
        path: path.display().to_string(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| load_error(e.to_string()))?;
    let df = read_csv_bytes(&bytes, options).map_err(|e| match e {
        PrepError::Load { reason, .. } => load_error(reason),
        other => load_error(other.to_string()),
    })?;

    info!(
        "Loaded {} ({} rows x {} columns)",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Parse delimited text held in memory.
pub fn read_csv_bytes(bytes: &[u8], options: &CsvOptions) -> Result<DataFrame> {
    let text = options.encoding.decode(bytes).map_err(|reason| PrepError::Load {
        path: "<memory>".to_string(),
        reason,
    })?;

    let (empty, tokens): (Vec<&String>, Vec<&String>) =
        options.null_values.iter().partition(|s| s.is_empty());
    let null_values = (!empty.is_empty())
        .then(|| NullValues::AllColumns(vec![PlSmallStr::from_static("")]));

    let df = CsvReadOptions::default()
        .with_has_header(options.has_header)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(options.delimiter)
                .with_quote_char(Some(b'"'))
                .with_null_values(null_values),
        )
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()
        .map_err(|e| PrepError::Load {
            path: "<memory>".to_string(),
            reason: e.to_string(),
        })?;

    parse_numeric_text(df, &tokens)
}

/// Turn text columns holding only numbers and null tokens into numeric
/// columns. Any other text keeps the column as text, tokens included.
fn parse_numeric_text(mut df: DataFrame, tokens: &[&String]) -> Result<DataFrame> {
    if tokens.is_empty() {
        return Ok(df);
    }

    let mut parsed = Vec::new();
    for column in df.get_columns() {
        if column.dtype() != &DataType::String {
            continue;
        }
        let cells: Vec<Option<&str>> = column
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.filter(|cell| !tokens.iter().any(|t| t.as_str() == *cell)))
            .collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }

        let name = column.name().clone();
        if let Some(ints) = parse_cells::<i64>(&cells) {
            parsed.push(Series::new(name, ints));
        } else if let Some(floats) = parse_cells::<f64>(&cells) {
            parsed.push(Series::new(name, floats));
        }
    }

    for series in parsed {
        debug!("Column '{}' read as {} with null tokens", series.name(), series.dtype());
        df.with_column(series)?;
    }
    Ok(df)
}

fn parse_cells<T: std::str::FromStr>(cells: &[Option<&str>]) -> Option<Vec<Option<T>>> {
    cells
        .iter()
        .map(|cell| match cell {
            Some(text) => text.trim().parse().ok().map(Some),
            None => Some(None),
        })
        .collect()
}

/// Write a table as comma-separated UTF-8 with a header row, creating parent
/// directories as needed.
pub fn save_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    save_csv_with_delimiter(df, path, b',')
}

/// Like [`save_csv`] with a custom field delimiter.
pub fn save_csv_with_delimiter(df: &DataFrame, path: impl AsRef<Path>, delimiter: u8) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    write_csv(df, &mut file, delimiter)?;
    info!("Saved {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Serialize a table to comma-separated bytes.
pub fn to_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(df, &mut buffer, b',')?;
    Ok(buffer)
}

fn write_csv<W: Write>(df: &DataFrame, writer: &mut W, delimiter: u8) -> Result<()> {
    let mut df = df.clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(delimiter)
        .with_quote_char(b'"')
        .finish(&mut df)?;
    debug!("Wrote {} rows x {} columns", df.height(), df.width());
    Ok(())
}
