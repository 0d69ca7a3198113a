//! Missing-value resolution.
//!
//! Each column with missing entries is resolved by its configured strategy,
//! in three passes over the dataset:
//! 1. drop-column, including escalation of any column whose missing rate
//!    exceeds `missing_rate_drop_threshold`
//! 2. drop-row
//! 3. fills (constant, mean, median, interpolate) on the surviving rows
//!
//! Mean and median fills use the profiled statistics of the column, taken
//! before any row was dropped.
//!
//! A column whose fill cannot be computed is reported as a failed item and
//! left as it was; the other columns are still resolved.

mod interpolate;
mod statistical;

pub use interpolate::interpolate_linear;
pub use statistical::{Statistic, StatisticalImputer};

use crate::config::{MissingStrategy, StrategyConfig};
use crate::dataset::{ColumnSpec, Dataset};
use crate::profiler::Profiler;
use crate::types::{DatasetProfile, FailedItem, MissingAction, StageFindings, StageKind};
use anyhow::Result;
use tracing::{debug, info, warn};

/// Missing-value resolver.
pub struct MissingValueResolver;

impl MissingValueResolver {
    /// Resolve missing entries in every column with a configured strategy.
    ///
    /// Profiles `dataset` first for the mean and median fills.
    pub fn resolve(
        dataset: &Dataset,
        config: &StrategyConfig,
    ) -> Result<(Dataset, StageFindings, Vec<FailedItem>)> {
        Self::resolve_with_profile(dataset, config, &Profiler::profile(dataset, config))
    }

    /// Resolve missing entries, filling means and medians from `profile`.
    ///
    /// A column without profiled statistics falls back to its present values.
    pub fn resolve_with_profile(
        dataset: &Dataset,
        config: &StrategyConfig,
        profile: &DatasetProfile,
    ) -> Result<(Dataset, StageFindings, Vec<FailedItem>)> {
        let mut findings = StageFindings::new();
        let mut failed = Vec::new();
        let mut current = dataset.clone();
        let height = dataset.height();
        if height == 0 {
            return Ok((current, findings, failed));
        }

        // columns with missing entries and their configured strategy
        let mut pending: Vec<(ColumnSpec, Option<MissingStrategy>, usize)> = Vec::new();
        for spec in dataset.schema() {
            let missing = dataset.missing_count(&spec.name)?;
            if missing > 0 {
                pending.push((spec.clone(), config.rule_for(spec).missing, missing));
            }
        }

        // Pass 1: drop-column and escalation
        let mut remaining = Vec::new();
        for (spec, strategy, missing) in pending {
            let rate = missing as f64 / height as f64;
            let escalate = rate > config.missing_rate_drop_threshold;
            if !escalate && strategy != Some(MissingStrategy::DropColumn) {
                remaining.push((spec, strategy));
                continue;
            }

            let escalated_from = match (&strategy, escalate) {
                (Some(MissingStrategy::DropColumn), _) => None,
                (Some(s), true) => Some(s.name().to_string()),
                (None, true) => Some("none".to_string()),
                (_, false) => None,
            };
            if escalated_from.is_some() {
                info!(
                    "Escalating '{}' to drop-column: missing rate {:.1}% exceeds {:.1}%",
                    spec.name,
                    rate * 100.0,
                    config.missing_rate_drop_threshold * 100.0
                );
            }
            current = current.drop_column(&spec.name)?;
            findings.missing_actions.push(MissingAction {
                column: spec.name.clone(),
                strategy: MissingStrategy::DropColumn.name().to_string(),
                missing_before: missing,
                missing_rate: rate,
                filled: 0,
                rows_removed: 0,
                column_dropped: true,
                fill_value: None,
                escalated_from,
            });
        }

        // Pass 2: drop-row
        for (spec, strategy) in &remaining {
            if *strategy != Some(MissingStrategy::DropRow) {
                continue;
            }
            let nulls = current.series(&spec.name)?.is_null();
            let keep: Vec<bool> = nulls.into_iter().map(|v| !v.unwrap_or(false)).collect();
            let missing = keep.iter().filter(|k| !**k).count();
            if missing == 0 {
                continue;
            }
            debug!("Dropping {} rows with missing '{}'", missing, spec.name);
            let before = current.height();
            current = current.filter_rows(&keep)?;
            findings.missing_actions.push(MissingAction {
                column: spec.name.clone(),
                strategy: MissingStrategy::DropRow.name().to_string(),
                missing_before: missing,
                missing_rate: missing as f64 / before as f64,
                filled: 0,
                rows_removed: before - current.height(),
                column_dropped: false,
                fill_value: None,
                escalated_from: None,
            });
        }

        // Pass 3: fills
        for (spec, strategy) in &remaining {
            let Some(strategy) = strategy else {
                continue;
            };
            if matches!(strategy, MissingStrategy::DropRow | MissingStrategy::DropColumn) {
                continue;
            }
            let missing = current.missing_count(&spec.name)?;
            if missing == 0 {
                continue;
            }
            match Self::fill(&current, spec, strategy, profile) {
                Ok((updated, filled, fill_value)) => {
                    debug!(
                        "Filled {} entries in '{}' using {}",
                        filled,
                        spec.name,
                        strategy.name()
                    );
                    findings.missing_actions.push(MissingAction {
                        column: spec.name.clone(),
                        strategy: strategy.name().to_string(),
                        missing_before: missing,
                        missing_rate: missing as f64 / current.height() as f64,
                        filled,
                        rows_removed: 0,
                        column_dropped: false,
                        fill_value,
                        escalated_from: None,
                    });
                    current = updated;
                }
                Err(e) => {
                    warn!("Could not resolve '{}': {}", spec.name, e);
                    failed.push(FailedItem::new(
                        StageKind::MissingValues,
                        spec.name.clone(),
                        e.to_string(),
                    ));
                }
            }
        }

        Ok((current, findings, failed))
    }

    /// Apply a fill strategy; returns the dataset, entries filled and the
    /// rendered fill value where there is a single one.
    fn fill(
        dataset: &Dataset,
        spec: &ColumnSpec,
        strategy: &MissingStrategy,
        profile: &DatasetProfile,
    ) -> Result<(Dataset, usize, Option<String>)> {
        match strategy {
            MissingStrategy::FillConstant(value) => {
                let (updated, filled) = StatisticalImputer::apply_constant(dataset, spec, value)?;
                Ok((updated, filled, Some(format!("{value:?}"))))
            }
            MissingStrategy::FillMean | MissingStrategy::FillMedian => {
                let statistic = if *strategy == MissingStrategy::FillMean {
                    Statistic::Mean
                } else {
                    Statistic::Median
                };
                let profiled = profile
                    .column(&spec.name)
                    .and_then(|col| col.stats.as_ref())
                    .map(|stats| statistic.from_stats(stats));
                let (updated, fill, filled) = match profiled {
                    Some(fill) => {
                        let (updated, filled) =
                            StatisticalImputer::apply_value(dataset, &spec.name, fill)?;
                        (updated, fill, filled)
                    }
                    None => StatisticalImputer::apply_statistic(dataset, &spec.name, statistic)?,
                };
                Ok((updated, filled, Some(fill.to_string())))
            }
            MissingStrategy::Interpolate => {
                let values = dataset.numeric_values(&spec.name)?;
                if values.iter().all(Option::is_none) {
                    anyhow::bail!("no present values to interpolate '{}' from", spec.name);
                }
                let filled = values.iter().filter(|v| v.is_none()).count();
                let updated = dataset.with_numeric_column(&spec.name, interpolate_linear(&values))?;
                Ok((updated, filled, None))
            }
            MissingStrategy::DropRow | MissingStrategy::DropColumn => {
                anyhow::bail!("{} is not a fill strategy", strategy.name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRule, FillValue};
    use polars::prelude::*;

    fn config_with(column: &str, strategy: MissingStrategy) -> StrategyConfig {
        StrategyConfig::builder()
            .without_type_defaults()
            .column_rule(column, ColumnRule::missing(strategy))
            .build()
            .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::from_frame(
            df![
                "a" => [Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)],
                "b" => [Some("x"), Some("y"), None, Some("z"), Some("w")],
                "c" => [None, None, None, None, Some(1i64)],
            ]
            .unwrap(),
        )
    }

    #[test]
    fn test_fill_median_leaves_no_missing() {
        let config = config_with("a", MissingStrategy::FillMedian);
        let (out, findings, failed) = MissingValueResolver::resolve(&dataset(), &config).unwrap();
        assert_eq!(out.missing_count("a").unwrap(), 0);
        assert_eq!(out.numeric_values("a").unwrap()[1], Some(3.5));
        assert!(failed.is_empty());
        let action = findings
            .missing_actions
            .iter()
            .find(|a| a.column == "a")
            .unwrap();
        assert_eq!(action.filled, 1);
        assert_eq!(action.fill_value.as_deref(), Some("3.5"));
    }

    #[test]
    fn test_fill_mean_uses_profiled_statistics() {
        let ds = Dataset::from_frame(
            df![
                "a" => [Some(1.0), None, Some(100.0)],
                "b" => [Some("x"), Some("y"), None],
            ]
            .unwrap(),
        );
        let config = StrategyConfig::builder()
            .without_type_defaults()
            .column_rule("a", ColumnRule::missing(MissingStrategy::FillMean))
            .column_rule("b", ColumnRule::missing(MissingStrategy::DropRow))
            .build()
            .unwrap();
        let profile = Profiler::profile(&ds, &config);

        let (out, findings, _) =
            MissingValueResolver::resolve_with_profile(&ds, &config, &profile).unwrap();

        // row 2 is gone before the fill, the mean still covers it
        assert_eq!(out.row_ids(), &[0, 1]);
        assert_eq!(out.numeric_values("a").unwrap(), vec![Some(1.0), Some(50.5)]);
        let action = findings
            .missing_actions
            .iter()
            .find(|a| a.column == "a")
            .unwrap();
        assert_eq!(action.fill_value.as_deref(), Some("50.5"));
    }

    #[test]
    fn test_drop_row_removes_exactly_affected_rows() {
        let config = config_with("b", MissingStrategy::DropRow);
        let (out, findings, _) = MissingValueResolver::resolve(&dataset(), &config).unwrap();
        assert_eq!(out.row_ids(), &[0, 1, 3, 4]);
        let action = findings
            .missing_actions
            .iter()
            .find(|a| a.column == "b")
            .unwrap();
        assert_eq!(action.rows_removed, 1);
    }

    #[test]
    fn test_escalation_to_drop_column_is_recorded() {
        // "c" is 80% missing, above the default 0.7 threshold
        let config = config_with("c", MissingStrategy::FillMean);
        let (out, findings, _) = MissingValueResolver::resolve(&dataset(), &config).unwrap();
        assert!(!out.has_column("c"));
        let action = findings
            .missing_actions
            .iter()
            .find(|a| a.column == "c")
            .unwrap();
        assert!(action.column_dropped);
        assert_eq!(action.escalated_from.as_deref(), Some("fill-mean"));
        assert!((action.missing_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_drop_column_evaluated_before_drop_row() {
        // dropping rows on "c" would keep one row; the column goes first
        let config = StrategyConfig::builder()
            .without_type_defaults()
            .column_rule("c", ColumnRule::missing(MissingStrategy::DropRow))
            .build()
            .unwrap();
        let (out, _, _) = MissingValueResolver::resolve(&dataset(), &config).unwrap();
        assert_eq!(out.height(), 5);
        assert!(!out.has_column("c"));
    }

    #[test]
    fn test_interpolate_column() {
        let config = config_with("a", MissingStrategy::Interpolate);
        let (out, _, _) = MissingValueResolver::resolve(&dataset(), &config).unwrap();
        assert_eq!(out.numeric_values("a").unwrap()[1], Some(2.0));
    }

    #[test]
    fn test_fill_constant_text() {
        let config = config_with(
            "b",
            MissingStrategy::FillConstant(FillValue::Text("n/a".into())),
        );
        let (out, _, _) = MissingValueResolver::resolve(&dataset(), &config).unwrap();
        assert_eq!(out.missing_count("b").unwrap(), 0);
    }

    #[test]
    fn test_unfillable_column_is_failed_item() {
        let ds = Dataset::from_frame(
            df!["x" => [None::<f64>, None], "y" => [1.0, 2.0]].unwrap(),
        );
        let config = StrategyConfig::builder()
            .without_type_defaults()
            .missing_rate_drop_threshold(1.0)
            .column_rule("x", ColumnRule::missing(MissingStrategy::FillMean))
            .build()
            .unwrap();
        let (out, _, failed) = MissingValueResolver::resolve(&ds, &config).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].target, "x");
        assert_eq!(out.missing_count("x").unwrap(), 2);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let ds = dataset();
        let before = ds.clone();
        let _ = MissingValueResolver::resolve(&ds, &StrategyConfig::default()).unwrap();
        assert_eq!(ds, before);
    }
}
