//! Loading tabular input into a [`Dataset`] and writing it back out.
//!
//! Every column is read as text and coerced to its declared type: values
//! are trimmed, empty strings and error markers ("n/a", "null", "error",
//! ...) become missing, and entries that do not parse as the declared type
//! become missing and are counted. Columns without a declared type get one
//! inferred from their values. Text columns named in [`LoadOptions`] are
//! also lowercased.

use crate::dataset::{ColumnSpec, ColumnType, Dataset};
use crate::error::{Result, ResultExt, SieveError};
use crate::profiler::type_check::infer_column_type;
use crate::utils::{
    is_missing_marker, parse_boolean_string, parse_numeric_string, parse_timestamp_millis,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What coercion did to one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCoercion {
    pub column: String,
    pub column_type: ColumnType,
    /// Whether the type was inferred rather than declared.
    pub inferred: bool,
    /// Empty strings and error markers read as missing.
    pub markers: usize,
    /// Present entries that did not parse as `column_type`.
    pub unparseable: usize,
    /// Text entries changed by lowercasing.
    #[serde(default)]
    pub normalized: usize,
}

/// Optional normalization applied while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Text columns to lowercase after trimming.
    pub lowercase: Vec<String>,
}

impl LoadOptions {
    pub fn lowercase(mut self, column: impl Into<String>) -> Self {
        self.lowercase.push(column.into());
        self
    }
}

/// A loaded dataset plus per-column coercion counts.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub coercions: Vec<ColumnCoercion>,
}

impl LoadedDataset {
    pub fn unparseable_total(&self) -> usize {
        self.coercions.iter().map(|c| c.unparseable).sum()
    }
}

/// Read a CSV file with a header row and coerce it.
///
/// `declared` may name any subset of the columns; the rest are inferred.
pub fn load_csv(path: impl AsRef<Path>, declared: &[ColumnSpec]) -> Result<LoadedDataset> {
    load_csv_with(path, declared, &LoadOptions::default())
}

/// [`load_csv`] with normalization options.
pub fn load_csv_with(
    path: impl AsRef<Path>,
    declared: &[ColumnSpec],
    options: &LoadOptions,
) -> Result<LoadedDataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SieveError::LoadFailed(format!(
            "input file not found: {}",
            path.display()
        )));
    }
    info!("Loading dataset from: {}", path.display());

    // schema length 0 reads every column as text
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .map_err(|e| SieveError::LoadFailed(e.to_string()))
        .context(format!("Reading {}", path.display()))?;

    let loaded = coerce_frame_with(frame, declared, options)?;
    info!(
        "Dataset loaded: {} rows x {} columns",
        loaded.dataset.height(),
        loaded.dataset.width()
    );
    Ok(loaded)
}

/// Coerce every column of `frame` to its declared or inferred type.
pub fn coerce_frame(frame: DataFrame, declared: &[ColumnSpec]) -> Result<LoadedDataset> {
    coerce_frame_with(frame, declared, &LoadOptions::default())
}

/// [`coerce_frame`] with normalization options.
pub fn coerce_frame_with(
    frame: DataFrame,
    declared: &[ColumnSpec],
    options: &LoadOptions,
) -> Result<LoadedDataset> {
    let referenced = declared
        .iter()
        .map(|spec| &spec.name)
        .chain(options.lowercase.iter());
    for name in referenced {
        if frame.column(name).is_err() {
            return Err(SieveError::ColumnNotFound(name.clone()));
        }
    }

    let mut columns = Vec::with_capacity(frame.width());
    let mut schema = Vec::with_capacity(frame.width());
    let mut coercions = Vec::with_capacity(frame.width());

    for column in frame.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().to_string();
        let declared_type = declared
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.column_type);

        let lowercase = options.lowercase.iter().any(|c| *c == name);
        let (coerced, coercion) = coerce_series(series, declared_type, lowercase)?;
        if coercion.unparseable > 0 {
            warn!(
                "'{}': {} entries are not valid {} values and were read as missing",
                name, coercion.unparseable, coercion.column_type
            );
        }
        debug!(
            "'{}' -> {} ({} markers)",
            name, coercion.column_type, coercion.markers
        );
        schema.push(ColumnSpec::new(name, coercion.column_type));
        columns.push(coerced.into_column());
        coercions.push(coercion);
    }

    let frame = DataFrame::new(columns)?;
    Ok(LoadedDataset {
        dataset: Dataset::new(frame, schema)?,
        coercions,
    })
}

fn coerce_series(
    series: &Series,
    declared: Option<ColumnType>,
    lowercase: bool,
) -> Result<(Series, ColumnCoercion)> {
    let name = series.name().clone();

    // already stored as the declared type
    if let Some(column_type) = declared
        && series.dtype() != &DataType::String
        && column_type.accepts_dtype(series.dtype())
    {
        let coerced = series.cast(&column_type.storage_dtype())?;
        return Ok((
            coerced,
            ColumnCoercion {
                column: name.to_string(),
                column_type,
                inferred: false,
                markers: 0,
                unparseable: 0,
                normalized: 0,
            },
        ));
    }

    let text = series.cast(&DataType::String)?;
    let mut markers = 0;
    let trimmed: Vec<Option<String>> = text
        .str()?
        .into_iter()
        .map(|v| match v {
            Some(s) if is_missing_marker(s) => {
                markers += 1;
                None
            }
            Some(s) => Some(s.trim().to_string()),
            None => None,
        })
        .collect();
    let cleaned = Series::new(name.clone(), &trimmed);

    let (column_type, inferred) = match declared {
        Some(t) => (t, false),
        None => (infer_column_type(&cleaned)?, true),
    };

    if lowercase && column_type != ColumnType::Text {
        warn!("'{}' is {}, not text; lowercasing skipped", name, column_type);
    }

    let mut unparseable = 0;
    let mut normalized = 0;
    let coerced = match column_type {
        ColumnType::Text if lowercase => {
            let lowered: Vec<Option<String>> = trimmed
                .iter()
                .map(|v| {
                    v.as_deref().map(|s| {
                        let lower = s.to_lowercase();
                        if lower != s {
                            normalized += 1;
                        }
                        lower
                    })
                })
                .collect();
            Series::new(name.clone(), lowered)
        }
        ColumnType::Text => cleaned,
        ColumnType::Float => Series::new(
            name.clone(),
            parse_column(&trimmed, &mut unparseable, parse_numeric_string),
        ),
        ColumnType::Integer => Series::new(
            name.clone(),
            parse_column(&trimmed, &mut unparseable, |s| {
                parse_numeric_string(s)
                    .filter(|x| x.fract() == 0.0)
                    .map(|x| x as i64)
            }),
        ),
        ColumnType::Boolean => Series::new(
            name.clone(),
            parse_column(&trimmed, &mut unparseable, parse_boolean_string),
        ),
        ColumnType::Timestamp => Series::new(
            name.clone(),
            parse_column(&trimmed, &mut unparseable, parse_timestamp_millis),
        )
        .cast(&ColumnType::Timestamp.storage_dtype())?,
    };

    Ok((
        coerced,
        ColumnCoercion {
            column: name.to_string(),
            column_type,
            inferred,
            markers,
            unparseable,
            normalized,
        },
    ))
}

fn parse_column<T>(
    values: &[Option<String>],
    unparseable: &mut usize,
    parser: impl Fn(&str) -> Option<T>,
) -> Vec<Option<T>> {
    values
        .iter()
        .map(|value| {
            let parsed = value.as_deref().and_then(&parser);
            if value.is_some() && parsed.is_none() {
                *unparseable += 1;
            }
            parsed
        })
        .collect()
}

/// Write a dataset as CSV with a header row.
pub fn write_csv(dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut frame = dataset.frame().clone();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut frame)?;
    info!("Dataset saved: {}", path.display());
    Ok(())
}
