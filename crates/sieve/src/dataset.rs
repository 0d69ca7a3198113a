//! The dataset handle threaded through the pipeline.
//!
//! A [`Dataset`] is an immutable value: a polars `DataFrame`, the declared
//! schema, and a stable row id per row. Every transformation returns a new
//! `Dataset`, so the orchestrator can always roll back to the value it held
//! before a stage began.

use crate::error::{Result, SieveError};
use crate::utils::{is_datetime_dtype, is_numeric_dtype, numeric_view};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

impl ColumnType {
    /// Integer and Float columns take part in numeric statistics.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Infer the declared type from a polars dtype.
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Float32 | DataType::Float64 => Self::Float,
            d if is_numeric_dtype(d) => Self::Integer,
            DataType::Boolean => Self::Boolean,
            d if is_datetime_dtype(d) => Self::Timestamp,
            _ => Self::Text,
        }
    }

    /// The polars dtype a column of this type is stored as after coercion.
    pub fn storage_dtype(&self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text => DataType::String,
            Self::Boolean => DataType::Boolean,
            Self::Timestamp => DataType::Datetime(TimeUnit::Milliseconds, None),
        }
    }

    /// Whether a frame dtype already satisfies this declared type.
    pub fn accepts_dtype(&self, dtype: &DataType) -> bool {
        match self {
            Self::Integer => is_numeric_dtype(dtype) && !dtype.is_float(),
            Self::Float => is_numeric_dtype(dtype),
            Self::Text => matches!(dtype, DataType::String | DataType::Categorical(_, _)),
            Self::Boolean => matches!(dtype, DataType::Boolean),
            Self::Timestamp => is_datetime_dtype(dtype),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        };
        f.pad(name)
    }
}

/// A declared column: name plus logical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Tabular data with a declared schema and stable row ids.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    schema: Vec<ColumnSpec>,
    row_ids: Vec<usize>,
}

impl Dataset {
    /// Create a dataset from a frame and its declared schema.
    ///
    /// The frame must contain exactly the declared columns, in any order;
    /// it is reordered to match the schema. Row ids are assigned from the
    /// row positions.
    pub fn new(frame: DataFrame, schema: Vec<ColumnSpec>) -> Result<Self> {
        if frame.width() != schema.len() {
            return Err(SieveError::InvalidDataset(format!(
                "frame has {} columns but schema declares {}",
                frame.width(),
                schema.len()
            )));
        }
        for spec in &schema {
            if frame.column(&spec.name).is_err() {
                return Err(SieveError::ColumnNotFound(spec.name.clone()));
            }
        }
        // frame columns follow the declared order
        let frame = frame.select(schema.iter().map(|spec| spec.name.as_str()))?;
        let row_ids = (0..frame.height()).collect();
        Ok(Self {
            frame,
            schema,
            row_ids,
        })
    }

    /// Create a dataset whose schema is inferred from the frame dtypes.
    pub fn from_frame(frame: DataFrame) -> Self {
        let schema = frame
            .get_columns()
            .iter()
            .map(|col| ColumnSpec::new(col.name().to_string(), ColumnType::from_dtype(col.dtype())))
            .collect();
        let row_ids = (0..frame.height()).collect();
        Self {
            frame,
            schema,
            row_ids,
        }
    }

    /// A dataset with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            frame: DataFrame::empty(),
            schema: Vec::new(),
            row_ids: Vec::new(),
        }
    }

    /// Assemble a dataset without checking its invariant.
    pub(crate) fn from_parts_unchecked(
        frame: DataFrame,
        schema: Vec<ColumnSpec>,
        row_ids: Vec<usize>,
    ) -> Self {
        Self {
            frame,
            schema,
            row_ids,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    /// Original row positions of the rows still present.
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn height(&self) -> usize {
        self.row_ids.len()
    }

    pub fn width(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn column_spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.schema.iter().find(|spec| spec.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_spec(name).is_some()
    }

    /// Borrow a column as a materialized series.
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map(|col| col.as_materialized_series())
            .map_err(|_| SieveError::ColumnNotFound(name.to_string()))
    }

    /// Number of missing entries (nulls) in a column.
    pub fn missing_count(&self, name: &str) -> Result<usize> {
        Ok(self.series(name)?.null_count())
    }

    /// Total number of missing cells across the declared columns.
    pub fn missing_cells(&self) -> usize {
        self.frame.get_columns().iter().map(|col| col.null_count()).sum()
    }

    /// Fraction of non-missing cells; 0.0 for an empty dataset.
    pub fn completeness(&self) -> f64 {
        let total = self.height() * self.width();
        if total == 0 {
            return 0.0;
        }
        total.saturating_sub(self.missing_cells()) as f64 / total as f64
    }

    /// Numeric view of a column. Unparseable and NaN entries read as `None`.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(numeric_view(self.series(name)?)?)
    }

    /// String view of a column.
    pub fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.series(name)?.cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    /// Replace a numeric column, storing Int64 for integer columns.
    pub(crate) fn with_numeric_column(&self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        let spec = self
            .column_spec(name)
            .ok_or_else(|| SieveError::ColumnNotFound(name.to_string()))?;
        let series = if spec.column_type == ColumnType::Integer {
            let ints: Vec<Option<i64>> = values
                .into_iter()
                .map(|v| v.map(|x| x.round() as i64))
                .collect();
            Series::new(name.into(), ints)
        } else {
            Series::new(name.into(), values)
        };
        self.with_series(series)
    }

    /// Replace the column with the same name as `series`.
    pub(crate) fn with_series(&self, series: Series) -> Result<Self> {
        let name = series.name().to_string();
        let mut frame = self.frame.clone();
        frame.replace(&name, series)?;
        Ok(Self {
            frame,
            schema: self.schema.clone(),
            row_ids: self.row_ids.clone(),
        })
    }

    /// Keep the rows whose mask entry is `true`.
    pub(crate) fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.height() {
            return Err(SieveError::InvalidDataset(format!(
                "row mask has {} entries for {} rows",
                keep.len(),
                self.height()
            )));
        }
        let row_ids = self
            .row_ids
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(id, _)| *id)
            .collect();
        let frame = if self.frame.width() == 0 {
            self.frame.clone()
        } else {
            let mask = BooleanChunked::from_slice("mask".into(), keep);
            self.frame.filter(&mask)?
        };
        Ok(Self {
            frame,
            schema: self.schema.clone(),
            row_ids,
        })
    }

    /// Remove a column from both the frame and the declared schema.
    pub(crate) fn drop_column(&self, name: &str) -> Result<Self> {
        if !self.has_column(name) {
            return Err(SieveError::ColumnNotFound(name.to_string()));
        }
        let frame = self.frame.drop(name)?;
        let schema = self
            .schema
            .iter()
            .filter(|spec| spec.name != name)
            .cloned()
            .collect();
        Ok(Self {
            frame,
            schema,
            row_ids: self.row_ids.clone(),
        })
    }

    /// Check that every row still carries exactly the declared columns.
    pub fn check_structure(&self) -> std::result::Result<(), String> {
        if self.frame.width() != self.schema.len() {
            return Err(format!(
                "frame has {} columns, schema declares {}",
                self.frame.width(),
                self.schema.len()
            ));
        }
        for (col, spec) in self.frame.get_columns().iter().zip(&self.schema) {
            if col.name().as_str() != spec.name {
                return Err(format!(
                    "column '{}' found where '{}' is declared",
                    col.name(),
                    spec.name
                ));
            }
        }
        if self.frame.width() > 0 && self.frame.height() != self.row_ids.len() {
            return Err(format!(
                "frame has {} rows but {} row ids are tracked",
                self.frame.height(),
                self.row_ids.len()
            ));
        }
        Ok(())
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.row_ids == other.row_ids
            && self.frame.equals_missing(&other.frame)
    }
}
