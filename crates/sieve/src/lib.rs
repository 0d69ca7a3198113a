//! Sieve: an auditable batch data-quality engine built on Polars.
//!
//! # Overview
//!
//! A run takes a [`Dataset`] and a [`StrategyConfig`] and returns a cleaned
//! dataset, a [`QualityReport`] describing every corrective action, and an
//! [`Outcome`]:
//!
//! - **Profiling**: missing rates, declared-vs-inferred type mismatches,
//!   distribution statistics, outlier and duplicate candidates
//! - **Missing values**: fill-constant, fill-mean, fill-median, interpolate,
//!   drop-row, drop-column, with automatic escalation to drop-column
//! - **Outliers**: IQR, Z-score and fixed-range detection with drop, clip or
//!   replace-median remediation
//! - **Deduplication**: key-based grouping with most-recent or most-complete
//!   survivor selection
//! - **Cross validation** after every stage, gating progression
//! - **Recovery**: bounded retries against the pre-stage dataset, abort with
//!   the last known-good dataset, cooperative cancellation between stages
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sieve::{DedupConfig, Pipeline, StrategyConfig, loader};
//!
//! let loaded = loader::load_csv("data.csv", &[])?;
//!
//! let config = StrategyConfig::builder()
//!     .dedup(DedupConfig::most_recent(vec!["id".into()], "updated_at"))
//!     .min_row_retention_fraction(0.9)
//!     .build()?;
//!
//! let output = Pipeline::builder().config(config).build()?.run(loaded.dataset)?;
//!
//! println!("Outcome: {}", output.outcome);
//! println!("{}", output.report.to_json_pretty()?);
//! ```
//!
//! # Configuration
//!
//! Rules resolve per column with precedence column > column type > default.
//! [`StrategyConfig`] deserializes from JSON:
//!
//! ```json
//! {
//!   "columns": {
//!     "price": { "missing": "fill-median", "outlier": { "method": "iqr", "k": 1.5, "action": "clip" } },
//!     "note":  { "missing": { "fill-constant": "n/a" } }
//!   },
//!   "dedup": { "key": ["id"], "tiebreak": "most-recent", "order_column": "ts" },
//!   "min_row_retention_fraction": 0.9,
//!   "retry_limit": 2,
//!   "validation_severity_threshold": "high"
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod dataset;
pub mod error;
pub mod imputers;
pub mod loader;
pub mod outliers;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod types;
pub mod utils;

pub use cleaner::Deduplicator;
pub use config::{
    ColumnRule, ConfigValidationError, DedupConfig, FillValue, MissingStrategy, OutlierAction,
    OutlierMethod, OutlierRule, Severity, StrategyConfig, StrategyConfigBuilder, TieBreak,
};
pub use dataset::{ColumnSpec, ColumnType, Dataset};
pub use error::{Result as SieveResult, ResultExt, SieveError};
pub use imputers::MissingValueResolver;
pub use loader::{ColumnCoercion, LoadOptions, LoadedDataset};
pub use outliers::OutlierResolver;
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, OrchestratorState, Pipeline, PipelineBuilder,
    ProgressReporter, ProgressUpdate, RecoveryOrchestrator, RunOutput, RunPhase, Stage,
    StageContext, StageResult,
};
pub use profiler::Profiler;
pub use quality::{CrossValidator, ValidationScope};
pub use reporting::{JsonFileSink, MemorySink, QualityReport, ReportSink, ReportSummary, TracingSink};
pub use types::{
    ColumnProfile, DatasetProfile, DuplicateGroup, FailedItem, MissingAction, NumericStats,
    OutlierFinding, Outcome, StageFindings, StageKind, StageRecord, StageStatus, ValidationCheck,
    ValidationOutcome,
};

/// Run the default stages over `dataset` with `config`.
///
/// Equivalent to building a [`Pipeline`] with no sinks, progress reporter
/// or cancellation token.
///
/// # Errors
///
/// Returns [`SieveError::InvalidConfig`] when the configuration is invalid
/// or does not fit the dataset.
pub fn run(dataset: Dataset, config: StrategyConfig) -> SieveResult<RunOutput> {
    Pipeline::builder().config(config).build()?.run(dataset)
}
