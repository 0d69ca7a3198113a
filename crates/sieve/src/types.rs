//! Serializable records produced by the engine: profiles, findings and
//! the per-stage audit entries collected into the quality report.

use crate::config::Severity;
use crate::dataset::ColumnType;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Profiles
// ============================================================================

/// Distribution statistics for a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    /// Number of non-missing values the statistics were computed from.
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    /// Sample standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericStats {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub declared_type: ColumnType,
    /// Type suggested by the stored values.
    pub inferred_type: ColumnType,
    /// Physical polars dtype.
    pub dtype: String,
    pub missing_count: usize,
    pub missing_rate: f64,
    /// Present values that do not parse as the declared type.
    pub type_mismatches: usize,
    pub unique_count: usize,
    pub sample_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,
    /// Values outside the configured outlier rule's bounds, if a rule applies.
    pub outlier_candidates: usize,
}

/// Rows sharing the same dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub key: Vec<String>,
    pub row_ids: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
    pub duplicate_candidates: Vec<DuplicateCandidate>,
    /// Fraction of non-missing cells.
    pub completeness: f64,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing_count).sum()
    }

    /// Rows that would be removed by deduplication.
    pub fn duplicate_row_count(&self) -> usize {
        self.duplicate_candidates
            .iter()
            .map(|g| g.row_ids.len().saturating_sub(1))
            .sum()
    }
}

// ============================================================================
// Stage identity and outcomes
// ============================================================================

/// Pipeline stage identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Profiling,
    MissingValues,
    Outliers,
    Deduplication,
}

impl StageKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Profiling => "Profiling",
            Self::MissingValues => "Missing value resolution",
            Self::Outliers => "Outlier resolution",
            Self::Deduplication => "Deduplication",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    PartialSuccess,
    Aborted,
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::PartialSuccess => "partial_success",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    PartiallyFailed,
    /// Passed its own work but a validation below the threshold failed.
    PassedWithWarnings,
    Failed,
}

/// One entry per stage that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub status: StageStatus,
    pub attempts: u32,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub duration_ms: u64,
}

// ============================================================================
// Findings
// ============================================================================

/// What the missing-value stage did to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAction {
    pub column: String,
    /// Strategy actually applied.
    pub strategy: String,
    pub missing_before: usize,
    pub missing_rate: f64,
    /// Entries filled in place.
    pub filled: usize,
    pub rows_removed: usize,
    pub column_dropped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<String>,
    /// Configured strategy replaced by drop-column escalation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_from: Option<String>,
}

impl MissingAction {
    pub fn changed_data(&self) -> bool {
        self.filled > 0 || self.rows_removed > 0 || self.column_dropped
    }
}

/// A single flagged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFinding {
    pub row_id: usize,
    pub column: String,
    pub value: f64,
    pub method: String,
    /// k for IQR, z for Z-score; absent for fixed ranges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    pub action: String,
    /// Replacement value; absent when the row was dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<f64>,
}

/// A column excluded from outlier detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierExemption {
    pub column: String,
    pub method: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Key column names.
    pub key_columns: Vec<String>,
    /// Rendered key values shared by the group.
    pub key: Vec<String>,
    pub member_row_ids: Vec<usize>,
    pub survivor: usize,
    pub removed: Vec<usize>,
    pub rationale: String,
}

/// A step that was deliberately not performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub stage: StageKind,
    pub reason: String,
}

/// An item a stage could not process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub stage: StageKind,
    /// Column name, or "dataset".
    pub target: String,
    pub reason: String,
}

impl FailedItem {
    pub fn new(stage: StageKind, target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Everything one stage attempt found and did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StageFindings {
    pub missing_actions: Vec<MissingAction>,
    pub outliers: Vec<OutlierFinding>,
    pub exemptions: Vec<OutlierExemption>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub skips: Vec<SkipRecord>,
    pub notes: Vec<String>,
}

impl StageFindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of findings that changed data.
    pub fn corrective_count(&self) -> usize {
        self.missing_actions
            .iter()
            .filter(|a| a.changed_data())
            .count()
            + self.outliers.len()
            + self.duplicate_groups.len()
    }
}

// ============================================================================
// Validation and retries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    /// Every row still has the declared column set.
    Structure,
    /// Row count did not fall below the retention floor.
    RowRetention,
    /// Post-stage missing rate ceiling.
    MissingRate,
    /// Post-stage outlier rate ceiling.
    OutlierRate,
}

impl ValidationCheck {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Structure => Severity::Critical,
            Self::RowRetention => Severity::High,
            Self::MissingRate => Severity::Medium,
            Self::OutlierRate => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub stage: StageKind,
    pub attempt: u32,
    pub check: ValidationCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub passed: bool,
    pub severity: Severity,
    pub observed: f64,
    pub limit: f64,
    pub message: String,
}

/// Diagnostic entry written for every retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryEntry {
    pub stage: StageKind,
    /// 1-based retry number (the first attempt is not a retry).
    pub retry: u32,
    pub reason: String,
}
