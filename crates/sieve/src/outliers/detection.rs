//! Outlier bounds for the supported detection methods.

use crate::config::OutlierMethod;
use crate::profiler::statistics::{mean, quantile, sorted_present, std_dev};

/// Reason recorded for columns that cannot be tested statistically.
pub const INSUFFICIENT_VARIANCE: &str = "insufficient variance";

/// Inclusive acceptable range. A value on a bound is not an outlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    pub fn is_outlier(&self, value: f64) -> bool {
        self.lower.is_some_and(|lo| value < lo) || self.upper.is_some_and(|hi| value > hi)
    }

    /// Nearest bound for a value outside the range; the value itself otherwise.
    pub fn clip(&self, value: f64) -> f64 {
        match (self.lower, self.upper) {
            (Some(lo), _) if value < lo => lo,
            (_, Some(hi)) if value > hi => hi,
            _ => value,
        }
    }
}

/// Result of fitting a method to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Fitted {
        bounds: Bounds,
        /// k or z, if the method has one.
        threshold: Option<f64>,
    },
    Exempt(String),
}

/// Fit the detection method to the present values of a column.
pub fn fit(values: &[Option<f64>], method: &OutlierMethod) -> Detection {
    let exempt = || Detection::Exempt(INSUFFICIENT_VARIANCE.to_string());
    let sorted = sorted_present(values);

    match method {
        OutlierMethod::Range { min, max } => Detection::Fitted {
            bounds: Bounds {
                lower: *min,
                upper: *max,
            },
            threshold: None,
        },
        _ if sorted.len() < 2 => exempt(),
        OutlierMethod::Iqr { k } => {
            let (Some(q1), Some(q3)) = (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) else {
                return exempt();
            };
            let iqr = q3 - q1;
            Detection::Fitted {
                bounds: Bounds {
                    lower: Some(q1 - k * iqr),
                    upper: Some(q3 + k * iqr),
                },
                threshold: Some(*k),
            }
        }
        OutlierMethod::Zscore { z_threshold } => {
            let std = std_dev(&sorted);
            let Some(mean) = mean(&sorted).filter(|_| std > 0.0) else {
                return exempt();
            };
            Detection::Fitted {
                bounds: Bounds {
                    lower: Some(mean - z_threshold * std),
                    upper: Some(mean + z_threshold * std),
                },
                threshold: Some(*z_threshold),
            }
        }
    }
}

/// Row positions of flagged values.
pub fn flagged_positions(values: &[Option<f64>], bounds: &Bounds) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| bounds.is_outlier(*x)).map(|_| i))
        .collect()
}

/// Count flagged values; zero for exempt columns.
pub fn count_outliers(values: &[Option<f64>], method: &OutlierMethod) -> usize {
    match fit(values, method) {
        Detection::Fitted { bounds, .. } => flagged_positions(values, &bounds).len(),
        Detection::Exempt(_) => 0,
    }
}
