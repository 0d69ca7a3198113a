//! Stage sequencing with validation gates, retry and abort.
//!
//! ```text
//! Idle -> Profiling -> Resolving(s) -> Validating(s) -> Resolving(next) | Retrying(s) | Aborted | Completed
//! ```
//!
//! Every attempt of a stage runs against the dataset captured before the
//! stage began. A rejected attempt contributes its validation outcomes and a
//! retry entry to the report, but none of its findings.

use crate::config::StrategyConfig;
use crate::dataset::Dataset;
use crate::error::{Result, SieveError};
use crate::pipeline::progress::{CancellationToken, ProgressReporter, ProgressUpdate, RunPhase};
use crate::pipeline::stage::{Stage, StageContext, StageResult};
use crate::profiler::Profiler;
use crate::quality::{CrossValidator, ValidationScope};
use crate::reporting::{QualityReport, ReportSink};
use crate::types::{
    DatasetProfile, FailedItem, Outcome, RetryEntry, StageKind, StageRecord, StageStatus,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Profiling,
    Resolving(StageKind),
    Validating(StageKind),
    Retrying(StageKind),
    Aborted,
    Completed,
    Cancelled,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Profiling => write!(f, "profiling"),
            Self::Resolving(kind) => write!(f, "resolving ({kind})"),
            Self::Validating(kind) => write!(f, "validating ({kind})"),
            Self::Retrying(kind) => write!(f, "retrying ({kind})"),
            Self::Aborted => write!(f, "aborted"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a run that got past configuration validation.
#[derive(Debug)]
pub struct RunOutput {
    /// The final dataset. For `Aborted` and `Cancelled` this is the dataset
    /// as left by the last accepted stage.
    pub dataset: Dataset,
    /// The finalized report.
    pub report: QualityReport,
    pub outcome: Outcome,
    /// Sinks that failed to persist the report. The run itself is unaffected.
    pub sink_errors: Vec<SieveError>,
}

/// An accepted stage attempt.
struct Accepted {
    dataset: Dataset,
    status: StageStatus,
}

/// Drives one run through its stages.
pub struct RecoveryOrchestrator<'a> {
    config: &'a StrategyConfig,
    stages: &'a [Arc<dyn Stage>],
    token: &'a CancellationToken,
    progress: Option<&'a dyn ProgressReporter>,
    sinks: &'a [Arc<dyn ReportSink>],
    state: OrchestratorState,
    transitions: Vec<OrchestratorState>,
    report: QualityReport,
}

impl<'a> RecoveryOrchestrator<'a> {
    pub fn new(
        config: &'a StrategyConfig,
        stages: &'a [Arc<dyn Stage>],
        token: &'a CancellationToken,
        progress: Option<&'a dyn ProgressReporter>,
        sinks: &'a [Arc<dyn ReportSink>],
    ) -> Self {
        Self {
            config,
            stages,
            token,
            progress,
            sinks,
            state: OrchestratorState::Idle,
            transitions: vec![OrchestratorState::Idle],
            report: QualityReport::new(),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn transitions(&self) -> &[OrchestratorState] {
        &self.transitions
    }

    /// Run every stage over `dataset`.
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::InvalidConfig`] if the configuration does not
    /// fit the dataset. No stage has run in that case; the sinks still
    /// receive a finalized, aborted report recording the rejection.
    pub fn run(&mut self, dataset: Dataset) -> Result<RunOutput> {
        info!(
            "Starting data-quality run: {} rows x {} columns, {} stages",
            dataset.height(),
            dataset.width(),
            self.stages.len()
        );
        self.report_progress(ProgressUpdate::new(
            RunPhase::Initializing,
            0.0,
            "Validating configuration...",
        ));
        if let Err(e) = self.config.validate_against(&dataset) {
            error!("Configuration rejected: {}", e);
            self.report_progress(ProgressUpdate::aborted(e.to_string()));
            let err = SieveError::from(e);
            self.reject(&dataset, &err);
            return Err(err);
        }

        // Profiling
        self.transition(OrchestratorState::Profiling);
        self.report_progress(ProgressUpdate::new(
            RunPhase::Profiling,
            0.0,
            "Profiling dataset...",
        ));
        let started = Instant::now();
        let profile = Profiler::profile(&dataset, self.config);
        debug!(
            "Initial profile: completeness {:.1}%, {} duplicate candidates",
            profile.completeness * 100.0,
            profile.duplicate_candidates.len()
        );
        self.report.set_initial_profile(profile.clone());
        self.report.record_stage(StageRecord {
            stage: StageKind::Profiling,
            status: StageStatus::Succeeded,
            attempts: 1,
            rows_before: dataset.height(),
            rows_after: dataset.height(),
            columns_before: dataset.width(),
            columns_after: dataset.width(),
            duration_ms: started.elapsed().as_millis() as u64,
        });
        self.report_progress(ProgressUpdate::new(
            RunPhase::Profiling,
            1.0,
            "Profiling complete",
        ));
        if self.token.is_cancelled() {
            info!("Cancellation requested after profiling");
            return Ok(self.finish(dataset, Outcome::Cancelled));
        }

        let mut current = dataset;
        let mut partial = false;
        let mut completed: Vec<StageKind> = Vec::new();
        let stages = self.stages;

        for stage in stages {
            let kind = stage.kind();
            completed.push(kind);
            let scope = ValidationScope::after(&completed);

            match self.run_stage(stage.as_ref(), &current, scope, &profile) {
                Some(accepted) => {
                    partial |= accepted.status != StageStatus::Succeeded;
                    current = accepted.dataset;
                }
                None => return Ok(self.finish(current, Outcome::Aborted)),
            }

            if self.token.is_cancelled() {
                info!("Cancellation requested after {}", kind);
                return Ok(self.finish(current, Outcome::Cancelled));
            }
        }

        let outcome = if partial {
            Outcome::PartialSuccess
        } else {
            Outcome::Completed
        };
        Ok(self.finish(current, outcome))
    }

    /// Run one stage with retries. `None` means retries were exhausted.
    fn run_stage(
        &mut self,
        stage: &dyn Stage,
        before: &Dataset,
        scope: ValidationScope,
        profile: &DatasetProfile,
    ) -> Option<Accepted> {
        let kind = stage.kind();
        let started = Instant::now();
        let max_attempts = self.config.retry_limit + 1;
        let mut attempt = 1;

        loop {
            self.transition(OrchestratorState::Resolving(kind));
            self.report_progress(
                ProgressUpdate::new(RunPhase::from(kind), 0.0, format!("{}...", kind))
                    .with_detail(format!("attempt {attempt}/{max_attempts}")),
            );

            match self.attempt(stage, before, attempt, scope, profile) {
                Ok(accepted) => {
                    info!(
                        "{} accepted after {} attempt(s): {} -> {} rows",
                        kind,
                        attempt,
                        before.height(),
                        accepted.dataset.height()
                    );
                    self.report.record_stage(StageRecord {
                        stage: kind,
                        status: accepted.status,
                        attempts: attempt,
                        rows_before: before.height(),
                        rows_after: accepted.dataset.height(),
                        columns_before: before.width(),
                        columns_after: accepted.dataset.width(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    self.report_progress(ProgressUpdate::new(
                        RunPhase::from(kind),
                        1.0,
                        format!("{} complete", kind),
                    ));
                    return Some(accepted);
                }
                Err(reason) if attempt > self.config.retry_limit => {
                    error!(
                        "{} failed after {} attempt(s), aborting: {}",
                        kind, attempt, reason
                    );
                    self.report.record_failed_items(vec![FailedItem::new(
                        kind,
                        kind.to_string(),
                        format!("retries exhausted: {reason}"),
                    )]);
                    self.report.record_stage(StageRecord {
                        stage: kind,
                        status: StageStatus::Failed,
                        attempts: attempt,
                        rows_before: before.height(),
                        rows_after: before.height(),
                        columns_before: before.width(),
                        columns_after: before.width(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    return None;
                }
                Err(reason) => {
                    self.transition(OrchestratorState::Retrying(kind));
                    let entry = RetryEntry {
                        stage: kind,
                        retry: attempt,
                        reason,
                    };
                    warn!("Retrying {} (retry {}): {}", kind, entry.retry, entry.reason);
                    for sink in self.sinks {
                        sink.on_retry(&entry);
                    }
                    self.report.record_retry(entry);
                    attempt += 1;
                }
            }
        }
    }

    /// One attempt of a stage followed by its validation gate.
    ///
    /// `Err` carries the reason the attempt was rejected.
    fn attempt(
        &mut self,
        stage: &dyn Stage,
        before: &Dataset,
        attempt: u32,
        scope: ValidationScope,
        profile: &DatasetProfile,
    ) -> std::result::Result<Accepted, String> {
        let kind = stage.kind();
        let ctx = StageContext {
            config: self.config,
            profile,
            attempt,
        };
        let (dataset, findings, failed_items) = match stage.run(before, &ctx) {
            StageResult::Success { dataset, findings } => (dataset, findings, Vec::new()),
            StageResult::PartialFailure {
                dataset,
                findings,
                failed_items,
            } => (dataset, findings, failed_items),
            StageResult::Fatal { reason } => {
                warn!("{} attempt {} failed: {}", kind, attempt, reason);
                return Err(reason);
            }
        };

        self.transition(OrchestratorState::Validating(kind));
        let outcomes = CrossValidator::validate(before, &dataset, kind, attempt, scope, self.config);
        let threshold = self.config.validation_severity_threshold;
        let escalating: Vec<String> = CrossValidator::escalating(&outcomes, threshold)
            .into_iter()
            .map(|o| format!("{:?}: {}", o.check, o.message))
            .collect();
        let warnings: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.passed && o.severity < threshold)
            .map(|o| format!("{} validation ({:?}, {:?}): {}", kind, o.check, o.severity, o.message))
            .collect();
        self.report.record_validations(outcomes);

        if !escalating.is_empty() {
            let reason = format!("validation failed: {}", escalating.join("; "));
            warn!("{} attempt {} rejected: {}", kind, attempt, reason);
            return Err(reason);
        }

        let status = if !failed_items.is_empty() {
            StageStatus::PartiallyFailed
        } else if !warnings.is_empty() {
            StageStatus::PassedWithWarnings
        } else {
            StageStatus::Succeeded
        };
        for warning in warnings {
            warn!("{}", warning);
            self.report.add_warning(warning);
        }
        self.report.record_findings(findings);
        self.report.record_failed_items(failed_items);
        Ok(Accepted { dataset, status })
    }

    /// Finalize a report for a run that never started and hand it to the sinks.
    fn reject(&mut self, dataset: &Dataset, err: &SieveError) {
        let profile = Profiler::profile(dataset, self.config);
        let mut report = std::mem::replace(&mut self.report, QualityReport::new());
        report.set_initial_profile(profile.clone());
        report.record_failed_items(vec![FailedItem::new(
            StageKind::Profiling,
            "configuration",
            err.to_string(),
        )]);
        report.finalize(Outcome::Aborted, profile);
        for sink in self.sinks {
            if let Err(e) = sink.persist(&report) {
                warn!("Report sink failed: {}", e);
            }
        }
    }

    /// Finalize the report, hand it to the sinks and build the output.
    fn finish(&mut self, dataset: Dataset, outcome: Outcome) -> RunOutput {
        self.report_progress(ProgressUpdate::new(
            RunPhase::Reporting,
            0.0,
            "Assembling report...",
        ));
        let final_profile = Profiler::profile(&dataset, self.config);
        let mut report = std::mem::replace(&mut self.report, QualityReport::new());
        report.finalize(outcome, final_profile);

        let mut sink_errors = Vec::new();
        for sink in self.sinks {
            if let Err(e) = sink.persist(&report) {
                warn!("Report sink failed: {}", e);
                sink_errors.push(e);
            }
        }

        match outcome {
            Outcome::Completed | Outcome::PartialSuccess => {
                self.transition(OrchestratorState::Completed);
                self.report_progress(ProgressUpdate::complete(format!("Run {outcome}")));
            }
            Outcome::Aborted => {
                self.transition(OrchestratorState::Aborted);
                self.report_progress(ProgressUpdate::aborted("Run aborted after exhausting retries"));
            }
            Outcome::Cancelled => {
                self.transition(OrchestratorState::Cancelled);
                self.report_progress(ProgressUpdate::cancelled());
            }
        }

        let summary = report.summary();
        info!(
            "Run {}: {} -> {} rows, {} -> {} columns, {} corrective findings",
            outcome,
            summary.rows_before,
            summary.rows_after,
            summary.columns_before,
            summary.columns_after,
            summary.corrective_findings
        );

        RunOutput {
            dataset,
            report,
            outcome,
            sink_errors,
        }
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!("Orchestrator: {} -> {}", self.state, next);
        if matches!(next, OrchestratorState::Resolving(_)) && self.state != next {
            info!("Entering {}", next);
        }
        self.state = next;
        self.transitions.push(next);
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = self.progress {
            reporter.report(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::pipeline::stage::default_stages;
    use crate::reporting::MemorySink;
    use crate::types::StageFindings;
    use polars::prelude::*;

    struct AlwaysFails;

    impl Stage for AlwaysFails {
        fn kind(&self) -> StageKind {
            StageKind::Outliers
        }

        fn run(&self, _dataset: &Dataset, ctx: &StageContext<'_>) -> StageResult {
            StageResult::Fatal {
                reason: format!("injected failure on attempt {}", ctx.attempt),
            }
        }
    }

    /// Fails on the first attempt only.
    struct FlakyStage;

    impl Stage for FlakyStage {
        fn kind(&self) -> StageKind {
            StageKind::Deduplication
        }

        fn run(&self, dataset: &Dataset, ctx: &StageContext<'_>) -> StageResult {
            if ctx.attempt == 1 {
                StageResult::Fatal {
                    reason: "transient".into(),
                }
            } else {
                StageResult::Success {
                    dataset: dataset.clone(),
                    findings: StageFindings::new(),
                }
            }
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_frame(df!["v" => [Some(1.0), None, Some(3.0)]].unwrap())
    }

    #[test]
    fn test_completed_run_transitions() {
        let config = StrategyConfig::default();
        let stages = default_stages();
        let token = CancellationToken::new();
        let mut orchestrator = RecoveryOrchestrator::new(&config, &stages, &token, None, &[]);

        let output = orchestrator.run(dataset()).unwrap();

        assert_eq!(output.outcome, Outcome::Completed);
        assert_eq!(orchestrator.state(), OrchestratorState::Completed);
        let transitions = orchestrator.transitions();
        assert_eq!(transitions[0], OrchestratorState::Idle);
        assert_eq!(transitions[1], OrchestratorState::Profiling);
        assert_eq!(
            transitions[2],
            OrchestratorState::Resolving(StageKind::MissingValues)
        );
        assert_eq!(
            transitions[3],
            OrchestratorState::Validating(StageKind::MissingValues)
        );
        assert!(output.report.is_finalized());
    }

    #[test]
    fn test_abort_after_retry_limit() {
        let config = StrategyConfig::builder().retry_limit(2).build().unwrap();
        let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(AlwaysFails)];
        let token = CancellationToken::new();
        let sink = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn ReportSink>> = vec![sink.clone()];
        let mut orchestrator = RecoveryOrchestrator::new(&config, &stages, &token, None, &sinks);

        let input = dataset();
        let output = orchestrator.run(input.clone()).unwrap();

        assert_eq!(output.outcome, Outcome::Aborted);
        assert_eq!(output.dataset, input);
        assert_eq!(output.report.retries().len(), 2);
        assert_eq!(sink.retries().len(), 2);
        assert_eq!(sink.reports().len(), 1);
        assert_eq!(orchestrator.state(), OrchestratorState::Aborted);
        let retrying = orchestrator
            .transitions()
            .iter()
            .filter(|s| matches!(s, OrchestratorState::Retrying(_)))
            .count();
        assert_eq!(retrying, 2);
    }

    #[test]
    fn test_transient_failure_recovers() {
        let config = StrategyConfig::default();
        let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(FlakyStage)];
        let token = CancellationToken::new();
        let mut orchestrator = RecoveryOrchestrator::new(&config, &stages, &token, None, &[]);

        let output = orchestrator.run(dataset()).unwrap();

        assert_eq!(output.outcome, Outcome::Completed);
        assert_eq!(output.report.retries().len(), 1);
        let record = output
            .report
            .stages()
            .iter()
            .find(|r| r.stage == StageKind::Deduplication)
            .unwrap();
        assert_eq!(record.attempts, 2);
    }

    #[test]
    fn test_cancel_before_stages() {
        let config = StrategyConfig::default();
        let stages = default_stages();
        let token = CancellationToken::new();
        token.cancel();
        let mut orchestrator = RecoveryOrchestrator::new(&config, &stages, &token, None, &[]);

        let input = dataset();
        let output = orchestrator.run(input.clone()).unwrap();

        assert_eq!(output.outcome, Outcome::Cancelled);
        assert_eq!(output.dataset, input);
        assert_eq!(orchestrator.state(), OrchestratorState::Cancelled);
    }

    #[test]
    fn test_invalid_config_runs_nothing() {
        let config = StrategyConfig::builder()
            .column_rule("absent", crate::config::ColumnRule::ignored())
            .build()
            .unwrap();
        let stages = default_stages();
        let token = CancellationToken::new();
        let mut orchestrator = RecoveryOrchestrator::new(&config, &stages, &token, None, &[]);

        let err = orchestrator.run(dataset()).unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    #[test]
    fn test_invalid_config_still_reaches_sinks() {
        let config = StrategyConfig::builder()
            .column_rule("absent", crate::config::ColumnRule::ignored())
            .build()
            .unwrap();
        let stages = default_stages();
        let token = CancellationToken::new();
        let sink = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn ReportSink>> = vec![sink.clone()];
        let mut orchestrator = RecoveryOrchestrator::new(&config, &stages, &token, None, &sinks);

        assert!(orchestrator.run(dataset()).is_err());

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(report.is_finalized());
        assert_eq!(report.outcome(), Some(Outcome::Aborted));
        assert!(report.stages().is_empty());
        assert_eq!(report.failed_items().len(), 1);
        assert_eq!(report.failed_items()[0].target, "configuration");
        assert!(report.failed_items()[0].reason.contains("absent"));
    }
}
