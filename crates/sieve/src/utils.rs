//! Shared utilities for the data-quality engine.
//!
//! Dtype classification, lenient string parsing, and the numeric view used
//! by every numeric stage.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Common error/missing value markers in data.
pub const ERROR_MARKERS: [&str; 9] = [
    "error", "unknown", "n/a", "na", "nan", "null", "missing", "none", "#n/a",
];

/// Timestamp layouts accepted when coercing text.
pub const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Date-only layouts accepted when coercing text.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// ```rust,ignore
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is an error/missing value marker.
pub fn is_error_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Check if a string should be read as a missing entry.
pub fn is_missing_marker(s: &str) -> bool {
    s.trim().is_empty() || is_error_marker(s)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles currency symbols, percentages, and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a timestamp string into epoch milliseconds.
pub fn parse_timestamp_millis(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp_millis());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Common boolean true representations.
pub const BOOLEAN_TRUE_VALUES: [&str; 6] = ["true", "yes", "1", "t", "y", "on"];

/// Common boolean false representations.
pub const BOOLEAN_FALSE_VALUES: [&str; 6] = ["false", "no", "0", "f", "n", "off"];

/// Parse a boolean-looking string.
pub fn parse_boolean_string(s: &str) -> Option<bool> {
    let lower = s.trim().to_ascii_lowercase();
    if BOOLEAN_TRUE_VALUES.iter().any(|&v| v == lower) {
        Some(true)
    } else if BOOLEAN_FALSE_VALUES.iter().any(|&v| v == lower) {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// Series Views
// =============================================================================

/// Read a series as optional f64 values.
///
/// Numeric dtypes are cast, temporal dtypes read as their epoch value; string entries go through
/// [`parse_numeric_string`]. NaN reads as missing.
pub fn numeric_view(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let values: Vec<Option<f64>> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_numeric_string))
            .collect(),
        DataType::Float64 => series.f64()?.into_iter().collect(),
        _ => {
            let cast = series.to_physical_repr().cast(&DataType::Float64)?;
            cast.f64()?.into_iter().collect()
        }
    };
    Ok(values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_is_datetime_dtype() {
        assert!(is_datetime_dtype(&DataType::Date));
        assert!(is_datetime_dtype(&DataType::Datetime(
            TimeUnit::Milliseconds,
            None
        )));
        assert!(!is_datetime_dtype(&DataType::String));
    }

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
        assert_eq!(clean_numeric_string("  42%  "), "42");
        assert_eq!(clean_numeric_string("€100"), "100");
    }

    #[test]
    fn test_missing_markers() {
        assert!(is_missing_marker(""));
        assert!(is_missing_marker("  "));
        assert!(is_missing_marker("N/A"));
        assert!(is_missing_marker("null"));
        assert!(!is_missing_marker("42"));
        assert!(!is_missing_marker("chemise"));
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("-100"), Some(-100.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("hello"), None);
        assert_eq!(parse_numeric_string("NaN"), None);
    }

    #[test]
    fn test_parse_timestamp_millis() {
        assert_eq!(parse_timestamp_millis("1970-01-01 00:00:01"), Some(1000));
        assert_eq!(parse_timestamp_millis("1970-01-02"), Some(86_400_000));
        assert!(parse_timestamp_millis("2024-03-05T10:00:00Z").is_some());
        assert_eq!(parse_timestamp_millis("yesterday"), None);
    }

    #[test]
    fn test_parse_boolean_string() {
        assert_eq!(parse_boolean_string("YES"), Some(true));
        assert_eq!(parse_boolean_string("0"), Some(false));
        assert_eq!(parse_boolean_string("maybe"), None);
    }

    #[test]
    fn test_numeric_view_parses_strings() {
        let series = Series::new("s".into(), &[Some("1.5"), None, Some("$2"), Some("abc")]);
        let values = numeric_view(&series).unwrap();
        assert_eq!(values, vec![Some(1.5), None, Some(2.0), None]);
    }

    #[test]
    fn test_numeric_view_casts_integers() {
        let series = Series::new("i".into(), &[Some(1i64), None, Some(3)]);
        let values = numeric_view(&series).unwrap();
        assert_eq!(values, vec![Some(1.0), None, Some(3.0)]);
    }
}
