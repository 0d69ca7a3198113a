//! Constant and statistical fills.
//!
//! Mean and median fills take their value from the column's profiled
//! statistics when a profile is available, and from the present values of
//! the column otherwise.

use crate::config::FillValue;
use crate::dataset::{ColumnSpec, ColumnType, Dataset};
use crate::profiler::statistics::{mean, median, present, sorted_present};
use crate::types::NumericStats;
use anyhow::{Result, bail};
use polars::prelude::*;

/// Statistical fill methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Median,
}

impl Statistic {
    /// Compute the statistic over present values; `None` if there are none.
    pub fn compute(&self, values: &[Option<f64>]) -> Option<f64> {
        match self {
            Self::Mean => mean(&present(values)),
            Self::Median => median(&sorted_present(values)),
        }
    }

    /// Read the statistic from profiled column statistics.
    pub fn from_stats(&self, stats: &NumericStats) -> f64 {
        match self {
            Self::Mean => stats.mean,
            Self::Median => stats.median,
        }
    }
}

/// Replace missing entries with `fill`, returning the number filled.
pub fn fill_numeric(values: &[Option<f64>], fill: f64) -> (Vec<Option<f64>>, usize) {
    let filled = values.iter().filter(|v| v.is_none()).count();
    (values.iter().map(|v| Some(v.unwrap_or(fill))).collect(), filled)
}

/// Fills applied directly to a column.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill a numeric column with its mean or median.
    ///
    /// Returns the new dataset, the fill value and the number of entries filled.
    pub fn apply_statistic(
        dataset: &Dataset,
        column: &str,
        statistic: Statistic,
    ) -> Result<(Dataset, f64, usize)> {
        let values = dataset.numeric_values(column)?;
        let Some(fill) = statistic.compute(&values) else {
            bail!("no present values to compute {statistic:?} for '{column}'");
        };
        let (filled_values, filled) = fill_numeric(&values, fill);
        let updated = dataset.with_numeric_column(column, filled_values)?;
        Ok((updated, fill, filled))
    }

    /// Fill a numeric column with a precomputed value.
    pub fn apply_value(dataset: &Dataset, column: &str, fill: f64) -> Result<(Dataset, usize)> {
        let (filled_values, filled) = fill_numeric(&dataset.numeric_values(column)?, fill);
        Ok((dataset.with_numeric_column(column, filled_values)?, filled))
    }

    /// Fill a column with a constant of a compatible type.
    pub fn apply_constant(
        dataset: &Dataset,
        spec: &ColumnSpec,
        value: &FillValue,
    ) -> Result<(Dataset, usize)> {
        let name = spec.name.as_str();
        match (value, spec.column_type) {
            (FillValue::Number(n), ty) if ty.is_numeric() => {
                let (values, filled) = fill_numeric(&dataset.numeric_values(name)?, *n);
                Ok((dataset.with_numeric_column(name, values)?, filled))
            }
            (FillValue::Text(s), ColumnType::Text) => {
                let values = dataset.text_values(name)?;
                let filled = values.iter().filter(|v| v.is_none()).count();
                let values: Vec<Option<String>> = values
                    .into_iter()
                    .map(|v| Some(v.unwrap_or_else(|| s.clone())))
                    .collect();
                Ok((dataset.with_series(Series::new(name.into(), values))?, filled))
            }
            (FillValue::Bool(b), ColumnType::Boolean) => {
                let cast = dataset.series(name)?.cast(&DataType::Boolean)?;
                let filled = cast.null_count();
                let values: Vec<Option<bool>> =
                    cast.bool()?.into_iter().map(|v| Some(v.unwrap_or(*b))).collect();
                Ok((dataset.with_series(Series::new(name.into(), values))?, filled))
            }
            (value, ty) => bail!("fill-constant {value:?} does not fit {ty} column '{name}'"),
        }
    }
}
