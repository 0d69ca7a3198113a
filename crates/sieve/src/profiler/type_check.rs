//! Declared-versus-stored type checks.

use crate::dataset::ColumnType;
use crate::utils::{
    is_missing_marker, parse_boolean_string, parse_numeric_string, parse_timestamp_millis,
};
use polars::prelude::*;

/// Whether a raw text value can be read as the declared type.
pub(crate) fn value_conforms(value: &str, declared: ColumnType) -> bool {
    match declared {
        ColumnType::Integer => parse_numeric_string(value).is_some_and(|v| v.fract() == 0.0),
        ColumnType::Float => parse_numeric_string(value).is_some(),
        ColumnType::Boolean => parse_boolean_string(value).is_some(),
        ColumnType::Timestamp => parse_timestamp_millis(value).is_some(),
        ColumnType::Text => true,
    }
}

/// Count present values that do not conform to the declared type.
pub(crate) fn count_type_mismatches(series: &Series, declared: ColumnType) -> PolarsResult<usize> {
    let dtype = series.dtype();
    if declared.accepts_dtype(dtype) {
        return Ok(0);
    }

    match dtype {
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .flatten()
            .filter(|v| !value_conforms(v, declared))
            .count()),
        d if d.is_float() && declared == ColumnType::Integer => Ok(series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| v.fract() != 0.0)
            .count()),
        _ => {
            // physical type cannot hold the declared type at all
            Ok(series.len() - series.null_count())
        }
    }
}

/// Infer the most specific type every present value conforms to.
pub(crate) fn infer_column_type(series: &Series) -> PolarsResult<ColumnType> {
    if series.dtype() != &DataType::String {
        return Ok(ColumnType::from_dtype(series.dtype()));
    }

    let values: Vec<&str> = series
        .str()?
        .into_iter()
        .flatten()
        .filter(|v| !is_missing_marker(v))
        .collect();
    if values.is_empty() {
        return Ok(ColumnType::Text);
    }

    let candidates = [
        ColumnType::Integer,
        ColumnType::Float,
        ColumnType::Boolean,
        ColumnType::Timestamp,
    ];
    Ok(candidates
        .into_iter()
        .find(|ty| values.iter().all(|v| value_conforms(v, *ty)))
        .unwrap_or(ColumnType::Text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conforms() {
        assert!(value_conforms("42", ColumnType::Integer));
        assert!(!value_conforms("4.2", ColumnType::Integer));
        assert!(value_conforms("4.2", ColumnType::Float));
        assert!(value_conforms("yes", ColumnType::Boolean));
        assert!(value_conforms("2024-01-31", ColumnType::Timestamp));
        assert!(!value_conforms("abc", ColumnType::Float));
    }

    #[test]
    fn test_count_type_mismatches_on_text() {
        let series = Series::new("qty".into(), &[Some("1"), Some("two"), None, Some("3")]);
        assert_eq!(count_type_mismatches(&series, ColumnType::Integer).unwrap(), 1);
        assert_eq!(count_type_mismatches(&series, ColumnType::Text).unwrap(), 0);
    }

    #[test]
    fn test_count_type_mismatches_float_as_integer() {
        let series = Series::new("qty".into(), &[1.0f64, 2.5, 3.0]);
        assert_eq!(count_type_mismatches(&series, ColumnType::Integer).unwrap(), 1);
    }

    #[test]
    fn test_native_dtype_has_no_mismatches() {
        let series = Series::new("qty".into(), &[1i64, 2, 3]);
        assert_eq!(count_type_mismatches(&series, ColumnType::Integer).unwrap(), 0);
        assert_eq!(count_type_mismatches(&series, ColumnType::Float).unwrap(), 0);
    }

    #[test]
    fn test_infer_column_type() {
        let ints = Series::new("a".into(), &[Some("1"), Some("2"), Some("n/a")]);
        let floats = Series::new("b".into(), &[Some("1.5"), Some("2")]);
        let dates = Series::new("c".into(), &[Some("2024-01-01"), Some("2024-01-02")]);
        let text = Series::new("d".into(), &[Some("x"), Some("1")]);
        assert_eq!(infer_column_type(&ints).unwrap(), ColumnType::Integer);
        assert_eq!(infer_column_type(&floats).unwrap(), ColumnType::Float);
        assert_eq!(infer_column_type(&dates).unwrap(), ColumnType::Timestamp);
        assert_eq!(infer_column_type(&text).unwrap(), ColumnType::Text);
    }
}
