//! Deduplication of records by an equality key.
//!
//! Rows are grouped by the rendered values of the key columns. Rows with a
//! missing key value never join a group. Within a group of more than one
//! row a single survivor is chosen by the configured tie-break rule and the
//! rest are removed. Survivors keep their original position.

use crate::config::{DedupConfig, StrategyConfig, TieBreak};
use crate::dataset::{ColumnType, Dataset};
use crate::types::{DuplicateGroup, SkipRecord, StageFindings, StageKind};
use crate::utils::{parse_numeric_string, parse_timestamp_millis};
use anyhow::{Result, bail};
use std::collections::HashMap;
use tracing::{debug, info};

/// Rows sharing one key value, by position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyGroup {
    pub key: Vec<String>,
    pub positions: Vec<usize>,
}

/// Key columns for a dedup configuration; an empty key means every column.
pub(crate) fn key_columns(config: &DedupConfig, dataset: &Dataset) -> Vec<String> {
    if config.key.is_empty() {
        dataset.column_names().into_iter().map(String::from).collect()
    } else {
        config.key.clone()
    }
}

/// Group row positions by key, keeping groups with more than one member.
///
/// Groups are returned in order of their first member.
pub(crate) fn duplicate_groups(dataset: &Dataset, key: &[String]) -> Result<Vec<KeyGroup>> {
    if key.is_empty() || dataset.height() == 0 {
        return Ok(Vec::new());
    }

    let columns = key
        .iter()
        .map(|name| dataset.text_values(name))
        .collect::<crate::error::Result<Vec<_>>>()?;

    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<KeyGroup> = Vec::new();

    for row in 0..dataset.height() {
        let Some(values) = columns
            .iter()
            .map(|col| col[row].clone())
            .collect::<Option<Vec<String>>>()
        else {
            continue;
        };
        match index.get(&values) {
            Some(&g) => groups[g].positions.push(row),
            None => {
                index.insert(values.clone(), groups.len());
                groups.push(KeyGroup {
                    key: values,
                    positions: vec![row],
                });
            }
        }
    }

    groups.retain(|g| g.positions.len() > 1);
    Ok(groups)
}

/// Deduplicator for resolving duplicate records.
pub struct Deduplicator;

impl Deduplicator {
    /// Remove duplicate rows according to the configured key and tie-break.
    ///
    /// Returns the input unchanged when deduplication is not configured. A
    /// key column missing from the dataset is a recorded skip when
    /// `skip_if_key_missing` is set and an error otherwise.
    pub fn deduplicate(
        dataset: &Dataset,
        config: &StrategyConfig,
    ) -> Result<(Dataset, StageFindings)> {
        let mut findings = StageFindings::new();
        let Some(dedup) = &config.dedup else {
            debug!("Deduplication not configured");
            return Ok((dataset.clone(), findings));
        };

        let key = key_columns(dedup, dataset);
        let absent: Vec<&String> = key
            .iter()
            .chain(dedup.order_column.iter())
            .filter(|c| !dataset.has_column(c))
            .collect();
        if !absent.is_empty() {
            let reason = format!("key columns absent from dataset: {absent:?}");
            if dedup.skip_if_key_missing {
                info!("Skipping deduplication: {}", reason);
                findings.skips.push(SkipRecord {
                    stage: StageKind::Deduplication,
                    reason,
                });
                return Ok((dataset.clone(), findings));
            }
            bail!(reason);
        }

        let groups = duplicate_groups(dataset, &key)?;
        if groups.is_empty() {
            debug!("No duplicate groups for key {:?}", key);
            return Ok((dataset.clone(), findings));
        }

        let chooser = SurvivorChooser::new(dataset, dedup)?;
        let row_ids = dataset.row_ids();
        let mut keep = vec![true; dataset.height()];

        for group in groups {
            let (survivor, rationale) = chooser.choose(&group.positions);
            let removed: Vec<usize> = group
                .positions
                .iter()
                .copied()
                .filter(|&p| p != survivor)
                .collect();
            for &p in &removed {
                keep[p] = false;
            }
            debug!(
                "Duplicate group {:?}: keeping row {}, removing {}",
                group.key,
                row_ids[survivor],
                removed.len()
            );
            findings.duplicate_groups.push(DuplicateGroup {
                key_columns: key.clone(),
                key: group.key,
                member_row_ids: group.positions.iter().map(|&p| row_ids[p]).collect(),
                survivor: row_ids[survivor],
                removed: removed.iter().map(|&p| row_ids[p]).collect(),
                rationale,
            });
        }

        let removed = keep.iter().filter(|k| !**k).count();
        info!(
            "Removed {} duplicate rows in {} groups",
            removed,
            findings.duplicate_groups.len()
        );
        let deduped = dataset.filter_rows(&keep)?;
        Ok((deduped, findings))
    }
}

enum SurvivorChooser {
    MostRecent {
        column: String,
        order: Vec<Option<f64>>,
    },
    MostComplete {
        missing_per_row: Vec<usize>,
    },
}

impl SurvivorChooser {
    fn new(dataset: &Dataset, dedup: &DedupConfig) -> Result<Self> {
        match (dedup.tiebreak, &dedup.order_column) {
            (TieBreak::MostRecent, Some(column)) => Ok(Self::MostRecent {
                column: column.clone(),
                order: order_values(dataset, column)?,
            }),
            (TieBreak::MostRecent, None) => bail!("most-recent requires an ordering column"),
            (TieBreak::MostComplete, _) => Ok(Self::MostComplete {
                missing_per_row: missing_per_row(dataset)?,
            }),
        }
    }

    /// Survivor position and rationale. Ties go to the earliest row.
    fn choose(&self, positions: &[usize]) -> (usize, String) {
        let mut best = positions[0];
        match self {
            Self::MostRecent { column, order } => {
                let rank = |p: usize| order[p].unwrap_or(f64::NEG_INFINITY);
                for &p in &positions[1..] {
                    if rank(p) > rank(best) {
                        best = p;
                    }
                }
                let shown = order[best].map_or_else(|| "missing".to_string(), |v| v.to_string());
                (best, format!("most-recent by '{column}' ({shown})"))
            }
            Self::MostComplete { missing_per_row } => {
                for &p in &positions[1..] {
                    if missing_per_row[p] < missing_per_row[best] {
                        best = p;
                    }
                }
                (
                    best,
                    format!("most-complete ({} missing values)", missing_per_row[best]),
                )
            }
        }
    }
}

/// Orderable view of the ordering column. Text is read as a number or a
/// timestamp; unreadable values rank lowest.
fn order_values(dataset: &Dataset, column: &str) -> Result<Vec<Option<f64>>> {
    let is_text = dataset
        .column_spec(column)
        .is_some_and(|spec| spec.column_type == ColumnType::Text);
    if !is_text {
        return Ok(dataset.numeric_values(column)?);
    }
    Ok(dataset
        .text_values(column)?
        .into_iter()
        .map(|v| {
            v.and_then(|s| {
                parse_numeric_string(&s).or_else(|| parse_timestamp_millis(&s).map(|ms| ms as f64))
            })
        })
        .collect())
}

fn missing_per_row(dataset: &Dataset) -> Result<Vec<usize>> {
    let mut counts = vec![0usize; dataset.height()];
    for name in dataset.column_names() {
        let nulls = dataset.series(name)?.is_null();
        for (count, is_null) in counts.iter_mut().zip(nulls.into_iter()) {
            if is_null.unwrap_or(false) {
                *count += 1;
            }
        }
    }
    Ok(counts)
}
