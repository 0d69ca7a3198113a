//! Data profiling.
//!
//! The profiler reads a dataset and describes it without changing it:
//! - missing counts and rates per column
//! - declared-versus-stored type mismatches
//! - distribution statistics for numeric columns
//! - outlier candidates under the configured rule
//! - duplicate candidates under the configured key
//!
//! Profiling is total. An empty dataset yields an empty profile, and a
//! column that cannot be analysed is reported with its missing counts only.

pub(crate) mod statistics;
pub(crate) mod type_check;

use crate::cleaner::{duplicate_groups, key_columns};
use crate::config::StrategyConfig;
use crate::dataset::{ColumnSpec, Dataset};
use crate::outliers::detection::count_outliers;
use crate::types::{ColumnProfile, DatasetProfile, DuplicateCandidate};
use anyhow::Result;
use rand::prelude::*;
use tracing::{debug, warn};

pub(crate) use statistics::numeric_stats;
pub(crate) use type_check::infer_column_type;

/// Number of sample values kept per column.
const SAMPLE_SIZE: usize = 5;

/// Dataset profiler.
pub struct Profiler;

impl Profiler {
    /// Profile a dataset under the given configuration.
    pub fn profile(dataset: &Dataset, config: &StrategyConfig) -> DatasetProfile {
        if dataset.is_empty() {
            debug!("Profiling empty dataset");
            return DatasetProfile {
                row_count: dataset.height(),
                column_count: dataset.width(),
                ..DatasetProfile::default()
            };
        }

        let columns = dataset
            .schema()
            .iter()
            .map(|spec| {
                Self::profile_column(dataset, spec, config).unwrap_or_else(|e| {
                    warn!("Could not fully profile column '{}': {}", spec.name, e);
                    Self::minimal_profile(dataset, spec)
                })
            })
            .collect();

        let duplicate_candidates = Self::duplicate_candidates(dataset, config).unwrap_or_else(|e| {
            warn!("Duplicate candidate scan failed: {}", e);
            Vec::new()
        });

        DatasetProfile {
            row_count: dataset.height(),
            column_count: dataset.width(),
            columns,
            duplicate_candidates,
            completeness: dataset.completeness(),
        }
    }

    fn profile_column(
        dataset: &Dataset,
        spec: &ColumnSpec,
        config: &StrategyConfig,
    ) -> Result<ColumnProfile> {
        let series = dataset.series(&spec.name)?;
        let missing_count = series.null_count();

        let (stats, outlier_candidates) = if spec.column_type.is_numeric() {
            let values = dataset.numeric_values(&spec.name)?;
            let outliers = config
                .rule_for(spec)
                .outlier
                .map_or(0, |rule| count_outliers(&values, &rule.method));
            (numeric_stats(&values), outliers)
        } else {
            (None, 0)
        };

        Ok(ColumnProfile {
            name: spec.name.clone(),
            declared_type: spec.column_type,
            inferred_type: infer_column_type(series)?,
            dtype: format!("{:?}", series.dtype()),
            missing_count,
            missing_rate: missing_count as f64 / dataset.height() as f64,
            type_mismatches: type_check::count_type_mismatches(series, spec.column_type)?,
            unique_count: series.n_unique()?,
            sample_values: Self::sample_values(dataset, &spec.name)?,
            stats,
            outlier_candidates,
        })
    }

    fn minimal_profile(dataset: &Dataset, spec: &ColumnSpec) -> ColumnProfile {
        let missing_count = dataset.missing_count(&spec.name).unwrap_or(0);
        ColumnProfile {
            name: spec.name.clone(),
            declared_type: spec.column_type,
            inferred_type: spec.column_type,
            dtype: String::new(),
            missing_count,
            missing_rate: missing_count as f64 / dataset.height().max(1) as f64,
            type_mismatches: 0,
            unique_count: 0,
            sample_values: Vec::new(),
            stats: None,
            outlier_candidates: 0,
        }
    }

    /// Deterministic sample of present values.
    fn sample_values(dataset: &Dataset, name: &str) -> Result<Vec<String>> {
        let present: Vec<String> = dataset.text_values(name)?.into_iter().flatten().collect();
        let mut rng = StdRng::seed_from_u64(42);
        Ok(present
            .choose_multiple(&mut rng, SAMPLE_SIZE.min(present.len()))
            .cloned()
            .collect())
    }

    /// Candidates under the dedup key, or exact duplicates when no dedup
    /// is configured. Key columns absent from the dataset yield none.
    fn duplicate_candidates(
        dataset: &Dataset,
        config: &StrategyConfig,
    ) -> Result<Vec<DuplicateCandidate>> {
        let key = match &config.dedup {
            Some(dedup) => key_columns(dedup, dataset),
            None => dataset.column_names().into_iter().map(String::from).collect(),
        };
        if key.iter().any(|c| !dataset.has_column(c)) {
            return Ok(Vec::new());
        }

        let row_ids = dataset.row_ids();
        Ok(duplicate_groups(dataset, &key)?
            .into_iter()
            .map(|group| DuplicateCandidate {
                key: group.key,
                row_ids: group.positions.iter().map(|&p| row_ids[p]).collect(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRule, DedupConfig, OutlierAction, OutlierRule};
    use crate::dataset::ColumnType;
    use polars::prelude::*;

    fn sample() -> Dataset {
        Dataset::from_frame(
            df![
                "id" => [1i64, 2, 2, 3, 4, 5],
                "price" => [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(100.0)],
                "name" => ["a", "b", "b", "c", "d", "e"],
            ]
            .unwrap(),
        )
    }

    #[test]
    fn test_profile_does_not_mutate() {
        let ds = sample();
        let before = ds.clone();
        let _ = Profiler::profile(&ds, &StrategyConfig::default());
        assert_eq!(ds, before);
    }

    #[test]
    fn test_profile_missing_counts() {
        let profile = Profiler::profile(&sample(), &StrategyConfig::default());
        let price = profile.column("price").unwrap();
        assert_eq!(price.missing_count, 1);
        assert!((price.missing_rate - 1.0 / 6.0).abs() < 1e-9);
        assert_eq!(profile.total_missing(), 1);
        assert_eq!(profile.row_count, 6);
        assert_eq!(profile.column_count, 3);
    }

    #[test]
    fn test_profile_numeric_stats() {
        let profile = Profiler::profile(&sample(), &StrategyConfig::default());
        let stats = profile.column("price").unwrap().stats.clone().unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.median, 4.0);
        assert!(profile.column("name").unwrap().stats.is_none());
    }

    #[test]
    fn test_profile_outlier_candidates() {
        let config = StrategyConfig::builder()
            .column_rule(
                "price",
                ColumnRule::outlier(OutlierRule::iqr(1.5, OutlierAction::Clip)),
            )
            .build()
            .unwrap();
        let profile = Profiler::profile(&sample(), &config);
        assert_eq!(profile.column("price").unwrap().outlier_candidates, 1);
    }

    #[test]
    fn test_profile_duplicate_candidates_by_key() {
        let config = StrategyConfig::builder()
            .dedup(DedupConfig::most_complete(vec!["id".into()]))
            .build()
            .unwrap();
        let profile = Profiler::profile(&sample(), &config);
        assert_eq!(profile.duplicate_candidates.len(), 1);
        assert_eq!(profile.duplicate_candidates[0].row_ids, vec![1, 2]);
        assert_eq!(profile.duplicate_row_count(), 1);
    }

    #[test]
    fn test_profile_type_mismatches() {
        let frame = df!["qty" => ["1", "two", "3"]].unwrap();
        let ds = Dataset::new(frame, vec![ColumnSpec::new("qty", ColumnType::Integer)]).unwrap();
        let profile = Profiler::profile(&ds, &StrategyConfig::empty());
        let qty = profile.column("qty").unwrap();
        assert_eq!(qty.type_mismatches, 1);
        assert_eq!(qty.inferred_type, ColumnType::Text);
    }

    #[test]
    fn test_profile_empty_dataset() {
        let profile = Profiler::profile(&Dataset::empty(), &StrategyConfig::default());
        assert_eq!(profile.row_count, 0);
        assert!(profile.columns.is_empty());
    }
}
