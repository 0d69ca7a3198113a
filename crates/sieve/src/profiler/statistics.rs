//! Descriptive statistics over the numeric view of a column.
//!
//! All functions ignore missing entries. Quartiles use the lower-rank rule
//! `sorted[floor(p * (n - 1))]`.

use crate::types::NumericStats;

/// Present values, in row order.
pub(crate) fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Present values, ascending.
pub(crate) fn sorted_present(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted = present(values);
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of an ascending slice.
pub(crate) fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Sample standard deviation; 0.0 with fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Lower-rank quantile of an ascending slice.
pub(crate) fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted.get(idx).copied()
}

/// Full distribution summary, or `None` when no value is present.
pub(crate) fn numeric_stats(values: &[Option<f64>]) -> Option<NumericStats> {
    let sorted = sorted_present(values);
    let (&min, &max) = (sorted.first()?, sorted.last()?);
    Some(NumericStats {
        count: sorted.len(),
        mean: mean(&sorted)?,
        median: median(&sorted)?,
        q1: quantile(&sorted, 0.25)?,
        q3: quantile(&sorted, 0.75)?,
        std: std_dev(&sorted),
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== std_dev tests ====================

    #[test]
    fn test_std_dev_basic() {
        // Mean = 3, Variance = 10/4 = 2.5
        let std = std_dev(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((std - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_std_dev_single_value() {
        assert_eq!(std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn test_std_dev_identical_values() {
        assert_eq!(std_dev(&[5.0, 5.0, 5.0, 5.0]), 0.0);
    }

    // ==================== median / quantile tests ====================

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_quartiles_lower_rank() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert_eq!(quantile(&sorted, 0.25), Some(2.0));
        assert_eq!(quantile(&sorted, 0.75), Some(4.0));
    }

    // ==================== numeric_stats tests ====================

    #[test]
    fn test_numeric_stats_ignores_missing() {
        let stats = numeric_stats(&[Some(3.0), None, Some(1.0), Some(2.0)]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.median, 2.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_numeric_stats_all_missing() {
        assert!(numeric_stats(&[None, None]).is_none());
    }
}
