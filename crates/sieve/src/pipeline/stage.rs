//! Resolver stages run by the orchestrator.

use crate::cleaner::Deduplicator;
use crate::config::StrategyConfig;
use crate::dataset::Dataset;
use crate::imputers::MissingValueResolver;
use crate::outliers::OutlierResolver;
use crate::types::{DatasetProfile, FailedItem, StageFindings, StageKind};
use std::sync::Arc;

/// Read-only inputs a stage runs with.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a StrategyConfig,
    /// Profile of the run's input, taken before any stage ran.
    pub profile: &'a DatasetProfile,
    /// 1-based attempt number for this stage.
    pub attempt: u32,
}

/// Outcome of one stage attempt.
#[derive(Debug, Clone)]
pub enum StageResult {
    Success {
        dataset: Dataset,
        findings: StageFindings,
    },
    /// The stage produced a valid dataset but could not resolve some items.
    PartialFailure {
        dataset: Dataset,
        findings: StageFindings,
        failed_items: Vec<FailedItem>,
    },
    /// No usable dataset was produced.
    Fatal { reason: String },
}

impl StageResult {
    /// Map a resolver's return value onto a stage result.
    pub fn from_resolution(
        result: anyhow::Result<(Dataset, StageFindings, Vec<FailedItem>)>,
    ) -> Self {
        match result {
            Ok((dataset, findings, failed_items)) if failed_items.is_empty() => {
                Self::Success { dataset, findings }
            }
            Ok((dataset, findings, failed_items)) => Self::PartialFailure {
                dataset,
                findings,
                failed_items,
            },
            Err(e) => Self::Fatal {
                reason: format!("{e:#}"),
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// One resolver phase of the pipeline.
///
/// A stage must not mutate its input; it is re-run against the same input on
/// retry.
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn run(&self, dataset: &Dataset, ctx: &StageContext<'_>) -> StageResult;
}

/// Wraps [`MissingValueResolver`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingValueStage;

impl Stage for MissingValueStage {
    fn kind(&self) -> StageKind {
        StageKind::MissingValues
    }

    fn run(&self, dataset: &Dataset, ctx: &StageContext<'_>) -> StageResult {
        StageResult::from_resolution(MissingValueResolver::resolve_with_profile(
            dataset,
            ctx.config,
            ctx.profile,
        ))
    }
}

/// Wraps [`OutlierResolver`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OutlierStage;

impl Stage for OutlierStage {
    fn kind(&self) -> StageKind {
        StageKind::Outliers
    }

    fn run(&self, dataset: &Dataset, ctx: &StageContext<'_>) -> StageResult {
        StageResult::from_resolution(OutlierResolver::resolve(dataset, ctx.config))
    }
}

/// Wraps [`Deduplicator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeduplicationStage;

impl Stage for DeduplicationStage {
    fn kind(&self) -> StageKind {
        StageKind::Deduplication
    }

    fn run(&self, dataset: &Dataset, ctx: &StageContext<'_>) -> StageResult {
        StageResult::from_resolution(
            Deduplicator::deduplicate(dataset, ctx.config)
                .map(|(dataset, findings)| (dataset, findings, Vec::new())),
        )
    }
}

/// Missing values, then outliers, then deduplication.
pub fn default_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(MissingValueStage),
        Arc::new(OutlierStage),
        Arc::new(DeduplicationStage),
    ]
}
