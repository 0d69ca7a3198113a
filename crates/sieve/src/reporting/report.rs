//! The quality report accumulated over one run.

use crate::types::{
    DatasetProfile, DuplicateGroup, FailedItem, MissingAction, OutlierExemption, OutlierFinding,
    Outcome, RetryEntry, SkipRecord, StageFindings, StageRecord, ValidationOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Headline numbers for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportSummary {
    pub duration_ms: u64,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    /// Fraction of non-missing cells in the input (0.0 - 1.0).
    pub quality_score_before: f64,
    /// Fraction of non-missing cells in the output (0.0 - 1.0).
    pub quality_score_after: f64,
    pub corrective_findings: usize,
}

impl ReportSummary {
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn columns_removed(&self) -> usize {
        self.columns_before.saturating_sub(self.columns_after)
    }

    /// Change in quality score, in percentage points.
    pub fn quality_improvement(&self) -> f64 {
        (self.quality_score_after - self.quality_score_before) * 100.0
    }
}

/// Append-only record of everything a run attempted and did.
///
/// The orchestrator appends during the run and finalizes it on termination.
/// Callers only ever see the finalized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    outcome: Option<Outcome>,
    initial_profile: Option<DatasetProfile>,
    final_profile: Option<DatasetProfile>,
    stages: Vec<StageRecord>,
    missing_actions: Vec<MissingAction>,
    outliers: Vec<OutlierFinding>,
    exemptions: Vec<OutlierExemption>,
    duplicate_groups: Vec<DuplicateGroup>,
    skips: Vec<SkipRecord>,
    validations: Vec<ValidationOutcome>,
    retries: Vec<RetryEntry>,
    failed_items: Vec<FailedItem>,
    warnings: Vec<String>,
    summary: ReportSummary,
}

impl QualityReport {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
            initial_profile: None,
            final_profile: None,
            stages: Vec::new(),
            missing_actions: Vec::new(),
            outliers: Vec::new(),
            exemptions: Vec::new(),
            duplicate_groups: Vec::new(),
            skips: Vec::new(),
            validations: Vec::new(),
            retries: Vec::new(),
            failed_items: Vec::new(),
            warnings: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    // ------------------------------------------------------------------
    // Appending (orchestrator only)
    // ------------------------------------------------------------------

    pub(crate) fn set_initial_profile(&mut self, profile: DatasetProfile) {
        self.summary.rows_before = profile.row_count;
        self.summary.columns_before = profile.column_count;
        self.summary.quality_score_before = profile.completeness;
        self.initial_profile = Some(profile);
    }

    pub(crate) fn record_findings(&mut self, findings: StageFindings) {
        self.missing_actions.extend(findings.missing_actions);
        self.outliers.extend(findings.outliers);
        self.exemptions.extend(findings.exemptions);
        self.duplicate_groups.extend(findings.duplicate_groups);
        self.skips.extend(findings.skips);
        self.warnings.extend(findings.notes);
    }

    pub(crate) fn record_stage(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    pub(crate) fn record_validations(&mut self, outcomes: Vec<ValidationOutcome>) {
        self.validations.extend(outcomes);
    }

    pub(crate) fn record_retry(&mut self, entry: RetryEntry) {
        self.retries.push(entry);
    }

    pub(crate) fn record_failed_items(&mut self, items: Vec<FailedItem>) {
        self.failed_items.extend(items);
    }

    pub(crate) fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Close the report. Later appends are not possible through the public API.
    pub(crate) fn finalize(&mut self, outcome: Outcome, final_profile: DatasetProfile) {
        let finished_at = Utc::now();
        self.summary.duration_ms = (finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.summary.rows_after = final_profile.row_count;
        self.summary.columns_after = final_profile.column_count;
        self.summary.quality_score_after = final_profile.completeness;
        self.summary.corrective_findings = self.finding_count();
        self.finished_at = Some(finished_at);
        self.outcome = Some(outcome);
        self.final_profile = Some(final_profile);
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn initial_profile(&self) -> Option<&DatasetProfile> {
        self.initial_profile.as_ref()
    }

    pub fn final_profile(&self) -> Option<&DatasetProfile> {
        self.final_profile.as_ref()
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn missing_actions(&self) -> &[MissingAction] {
        &self.missing_actions
    }

    pub fn outliers(&self) -> &[OutlierFinding] {
        &self.outliers
    }

    pub fn exemptions(&self) -> &[OutlierExemption] {
        &self.exemptions
    }

    pub fn duplicate_groups(&self) -> &[DuplicateGroup] {
        &self.duplicate_groups
    }

    pub fn skips(&self) -> &[SkipRecord] {
        &self.skips
    }

    pub fn validations(&self) -> &[ValidationOutcome] {
        &self.validations
    }

    /// Validation outcomes that failed.
    pub fn validation_failures(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.validations.iter().filter(|v| !v.passed)
    }

    pub fn retries(&self) -> &[RetryEntry] {
        &self.retries
    }

    pub fn failed_items(&self) -> &[FailedItem] {
        &self.failed_items
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn summary(&self) -> &ReportSummary {
        &self.summary
    }

    /// Number of findings that changed data: missing-value actions that
    /// filled, removed or dropped something, flagged outliers, and resolved
    /// duplicate groups.
    pub fn finding_count(&self) -> usize {
        self.missing_actions
            .iter()
            .filter(|a| a.changed_data())
            .count()
            + self.outliers.len()
            + self.duplicate_groups.len()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
