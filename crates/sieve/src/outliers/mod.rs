//! Outlier resolution for numeric columns.
//!
//! Columns are processed in schema order. Each column's bounds are fitted
//! on the dataset as left by the previous column, so a `drop` on one
//! column is visible to the next. A column is refitted after remediation
//! until nothing is flagged, so the output is stable under another run.

pub mod detection;

use crate::config::{OutlierAction, OutlierRule, StrategyConfig};
use crate::dataset::{ColumnSpec, ColumnType, Dataset};
use crate::profiler::statistics::{median, sorted_present};
use crate::types::{FailedItem, OutlierExemption, OutlierFinding, StageFindings, StageKind};
use anyhow::{Result, bail};
use detection::{Bounds, Detection, count_outliers, fit, flagged_positions};
use tracing::{debug, info, warn};

/// Upper bound on fit-and-remediate passes per column.
const MAX_PASSES: usize = 10;

/// Outlier resolver.
pub struct OutlierResolver;

impl OutlierResolver {
    /// Detect and remediate outliers in every column with an outlier rule.
    pub fn resolve(
        dataset: &Dataset,
        config: &StrategyConfig,
    ) -> Result<(Dataset, StageFindings, Vec<FailedItem>)> {
        let mut findings = StageFindings::new();
        let mut failed = Vec::new();
        let mut current = dataset.clone();

        for spec in dataset.schema() {
            let Some(rule) = config.rule_for(spec).outlier else {
                continue;
            };
            if !spec.column_type.is_numeric() {
                failed.push(FailedItem::new(
                    StageKind::Outliers,
                    spec.name.clone(),
                    format!("outlier detection needs a numeric column, found {}", spec.column_type),
                ));
                continue;
            }

            match Self::resolve_column(&current, spec, &rule, &mut findings) {
                Ok(updated) => current = updated,
                Err(e) => {
                    warn!("Outlier resolution failed for '{}': {}", spec.name, e);
                    failed.push(FailedItem::new(StageKind::Outliers, spec.name.clone(), e.to_string()));
                }
            }
        }

        if !findings.outliers.is_empty() {
            info!("Resolved {} outlier values", findings.outliers.len());
        }
        Ok((current, findings, failed))
    }

    /// Fit, flag and remediate until the column has no flagged values.
    ///
    /// Remediation moves the fitted statistics, so a single pass can leave
    /// values that a fresh fit flags. Every pass is recorded. A value that
    /// is flagged again right after being clipped is replaced with the
    /// inlier median instead, since clipping it cannot settle.
    fn resolve_column(
        dataset: &Dataset,
        spec: &ColumnSpec,
        rule: &OutlierRule,
        findings: &mut StageFindings,
    ) -> Result<Dataset> {
        let mut current = dataset.clone();
        let mut clipped: Vec<usize> = Vec::new();

        for pass in 1..=MAX_PASSES {
            let values = current.numeric_values(&spec.name)?;
            let (bounds, threshold) = match fit(&values, &rule.method) {
                Detection::Fitted { bounds, threshold } => (bounds, threshold),
                Detection::Exempt(reason) => {
                    debug!("'{}' exempt from {}: {}", spec.name, rule.method.name(), reason);
                    if pass == 1 {
                        findings.exemptions.push(OutlierExemption {
                            column: spec.name.clone(),
                            method: rule.method.name().to_string(),
                            reason,
                        });
                    }
                    return Ok(current);
                }
            };

            let flagged = flagged_positions(&values, &bounds);
            if flagged.is_empty() {
                return Ok(current);
            }
            let row_ids = current.row_ids().to_vec();
            let action = if rule.action == OutlierAction::Clip
                && flagged.iter().any(|&pos| clipped.contains(&row_ids[pos]))
            {
                OutlierAction::ReplaceMedian
            } else {
                rule.action
            };
            debug!(
                "'{}' pass {}: {} values outside [{:?}, {:?}], {}",
                spec.name,
                pass,
                flagged.len(),
                bounds.lower,
                bounds.upper,
                action.name()
            );

            let replacement = Replacement::new(&values, &bounds, action, spec.column_type)?;
            let mut updated_values = values.clone();
            let mut keep = vec![true; values.len()];
            clipped.clear();

            for &pos in &flagged {
                let Some(original) = values[pos] else {
                    continue;
                };
                let new_value = replacement.value_for(original);
                match new_value {
                    Some(v) => updated_values[pos] = Some(v),
                    None => keep[pos] = false,
                }
                if action == OutlierAction::Clip {
                    clipped.push(row_ids[pos]);
                }
                findings.outliers.push(OutlierFinding {
                    row_id: row_ids[pos],
                    column: spec.name.clone(),
                    value: original,
                    method: rule.method.name().to_string(),
                    threshold,
                    lower_bound: bounds.lower,
                    upper_bound: bounds.upper,
                    action: action.name().to_string(),
                    new_value,
                });
            }

            current = match action {
                OutlierAction::Drop => current.filter_rows(&keep)?,
                _ => current.with_numeric_column(&spec.name, updated_values)?,
            };
        }

        let values = current.numeric_values(&spec.name)?;
        let remaining = count_outliers(&values, &rule.method);
        if remaining > 0 {
            warn!(
                "'{}': {} values still flagged after {} passes",
                spec.name, remaining, MAX_PASSES
            );
            findings.notes.push(format!(
                "outliers in '{}' did not settle after {} passes; {} values still flagged",
                spec.name, MAX_PASSES, remaining
            ));
        }
        Ok(current)
    }
}

/// Value written in place of an outlier; `None` removes the row.
enum Replacement {
    Clip(Bounds),
    Constant(f64),
    Drop,
}

impl Replacement {
    fn new(
        values: &[Option<f64>],
        bounds: &Bounds,
        action: OutlierAction,
        column_type: ColumnType,
    ) -> Result<Self> {
        match action {
            OutlierAction::Drop => Ok(Self::Drop),
            OutlierAction::Clip if column_type == ColumnType::Integer => {
                // integer storage rounds; keep clipped values inside the bounds
                Ok(Self::Clip(Bounds {
                    lower: bounds.lower.map(f64::ceil),
                    upper: bounds.upper.map(f64::floor),
                }))
            }
            OutlierAction::Clip => Ok(Self::Clip(*bounds)),
            OutlierAction::ReplaceMedian => {
                let inliers: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.filter(|x| !bounds.is_outlier(*x)))
                    .collect();
                match median(&sorted_present(&inliers)) {
                    Some(m) => Ok(Self::Constant(m)),
                    None => bail!("no non-outlier values to compute a median from"),
                }
            }
        }
    }

    fn value_for(&self, original: f64) -> Option<f64> {
        match self {
            Self::Clip(bounds) => Some(bounds.clip(original)),
            Self::Constant(v) => Some(*v),
            Self::Drop => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnRule;
    use polars::prelude::*;

    fn config(rule: OutlierRule) -> StrategyConfig {
        StrategyConfig::builder()
            .without_type_defaults()
            .column_rule("v", ColumnRule::outlier(rule))
            .build()
            .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::from_frame(df!["v" => [1.0, 2.0, 3.0, 4.0, 5.0, 100.0]].unwrap())
    }

    // ==================== action tests ====================

    #[test]
    fn test_iqr_clip_replaces_with_upper_bound() {
        let (out, findings, _) =
            OutlierResolver::resolve(&dataset(), &config(OutlierRule::iqr(1.5, OutlierAction::Clip)))
                .unwrap();
        assert_eq!(out.numeric_values("v").unwrap()[5], Some(7.0));
        assert_eq!(findings.outliers.len(), 1);
        let finding = &findings.outliers[0];
        assert_eq!(finding.row_id, 5);
        assert_eq!(finding.value, 100.0);
        assert_eq!(finding.new_value, Some(7.0));
        assert_eq!(finding.method, "iqr");
        assert_eq!(finding.threshold, Some(1.5));
    }

    #[test]
    fn test_iqr_drop_removes_row() {
        let (out, findings, _) =
            OutlierResolver::resolve(&dataset(), &config(OutlierRule::iqr(1.5, OutlierAction::Drop)))
                .unwrap();
        assert_eq!(out.row_ids(), &[0, 1, 2, 3, 4]);
        assert_eq!(findings.outliers[0].new_value, None);
    }

    #[test]
    fn test_replace_median_uses_inliers() {
        let (out, _, _) = OutlierResolver::resolve(
            &dataset(),
            &config(OutlierRule::iqr(1.5, OutlierAction::ReplaceMedian)),
        )
        .unwrap();
        assert_eq!(out.numeric_values("v").unwrap()[5], Some(3.0));
    }

    #[test]
    fn test_integer_clip_stays_inside_bounds() {
        let ds = Dataset::from_frame(df!["v" => [1i64, 2, 2, 3, 3, 4, 50]].unwrap());
        // Q1 = 2, Q3 = 3, upper = 3 + 1.5 = 4.5
        let (out, _, _) =
            OutlierResolver::resolve(&ds, &config(OutlierRule::iqr(1.5, OutlierAction::Clip))).unwrap();
        assert_eq!(out.numeric_values("v").unwrap()[6], Some(4.0));
    }

    #[test]
    fn test_range_rule_drops_non_positive() {
        let ds = Dataset::from_frame(df!["v" => [3.0, -1.0, 0.0, 8.0]].unwrap());
        let rule = OutlierRule::range(Some(0.5), None, OutlierAction::Drop);
        let (out, _, _) = OutlierResolver::resolve(&ds, &config(rule)).unwrap();
        assert_eq!(out.row_ids(), &[0, 3]);
    }

    // ==================== settling tests ====================

    #[test]
    fn test_replace_median_refits_until_nothing_flagged() {
        let ds = Dataset::from_frame(df!["v" => [1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 100.0]].unwrap());
        let cfg = config(OutlierRule::iqr(1.5, OutlierAction::ReplaceMedian));

        let (out, findings, _) = OutlierResolver::resolve(&ds, &cfg).unwrap();

        // the second fit (Q3 = 3) flags the 5
        assert_eq!(
            out.numeric_values("v").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(3.0), Some(3.0), Some(3.0)]
        );
        let rows: Vec<usize> = findings.outliers.iter().map(|f| f.row_id).collect();
        assert_eq!(rows, vec![5, 6, 4]);

        let (again, second, _) = OutlierResolver::resolve(&out, &cfg).unwrap();
        assert_eq!(again, out);
        assert!(second.outliers.is_empty());
    }

    #[test]
    fn test_zscore_clip_that_cannot_settle_falls_back_to_median() {
        let mut values = vec![0.0; 10];
        values.push(100.0);
        let ds = Dataset::from_frame(df!["v" => values].unwrap());
        let cfg = config(OutlierRule::zscore(3.0, OutlierAction::Clip));

        let (out, findings, _) = OutlierResolver::resolve(&ds, &cfg).unwrap();

        assert_eq!(out.numeric_values("v").unwrap()[10], Some(0.0));
        let actions: Vec<&str> = findings.outliers.iter().map(|f| f.action.as_str()).collect();
        assert_eq!(actions, vec!["clip", "replace-median"]);
        assert!(findings.notes.is_empty());

        let (again, second, _) = OutlierResolver::resolve(&out, &cfg).unwrap();
        assert_eq!(again, out);
        assert!(second.outliers.is_empty());
    }

    // ==================== exemption tests ====================

    #[test]
    fn test_zscore_zero_variance_is_exempt() {
        let ds = Dataset::from_frame(df!["v" => [5.0, 5.0, 5.0]].unwrap());
        let (out, findings, _) =
            OutlierResolver::resolve(&ds, &config(OutlierRule::zscore(3.0, OutlierAction::Clip)))
                .unwrap();
        assert_eq!(out, ds);
        assert_eq!(findings.exemptions.len(), 1);
        assert_eq!(findings.exemptions[0].reason, "insufficient variance");
        assert!(findings.outliers.is_empty());
    }

    #[test]
    fn test_missing_values_are_ignored() {
        let ds = Dataset::from_frame(
            df!["v" => [Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(100.0)]]
                .unwrap(),
        );
        let (out, findings, _) =
            OutlierResolver::resolve(&ds, &config(OutlierRule::iqr(1.5, OutlierAction::Clip)))
                .unwrap();
        assert_eq!(findings.outliers.len(), 1);
        assert_eq!(out.missing_count("v").unwrap(), 1);
    }
}
