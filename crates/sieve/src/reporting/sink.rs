//! Report sinks: destinations the finalized report is handed to.

use super::report::QualityReport;
use crate::error::{Result, SieveError};
use crate::types::RetryEntry;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Destination for run reports.
///
/// `persist` is called once, with the finalized report. `on_retry` is called
/// as retries happen, before the run finishes.
pub trait ReportSink: Send + Sync {
    fn persist(&self, report: &QualityReport) -> Result<()>;

    fn on_retry(&self, _entry: &RetryEntry) {}
}

/// Writes the report as pretty-printed JSON to a file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonFileSink {
    fn persist(&self, report: &QualityReport) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = report.to_json_pretty()?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        info!("Report saved: {}", self.path.display());
        Ok(())
    }
}

/// Emits the report summary and every failure through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn persist(&self, report: &QualityReport) -> Result<()> {
        let outcome = report
            .outcome()
            .ok_or_else(|| SieveError::SinkFailed("report was not finalized".to_string()))?;
        let summary = report.summary();
        info!(
            "Run {}: rows {} -> {}, columns {} -> {}, quality {:.1}% -> {:.1}%, {} corrective findings in {}ms",
            outcome,
            summary.rows_before,
            summary.rows_after,
            summary.columns_before,
            summary.columns_after,
            summary.quality_score_before * 100.0,
            summary.quality_score_after * 100.0,
            summary.corrective_findings,
            summary.duration_ms
        );
        for failure in report.validation_failures() {
            warn!(
                "{} attempt {}: {:?} check failed: {}",
                failure.stage, failure.attempt, failure.check, failure.message
            );
        }
        for item in report.failed_items() {
            warn!("{} could not resolve '{}': {}", item.stage, item.target, item.reason);
        }
        Ok(())
    }

    fn on_retry(&self, entry: &RetryEntry) {
        warn!("Retrying {} (retry {}): {}", entry.stage, entry.retry, entry.reason);
    }
}

/// Keeps reports and retry notifications in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<QualityReport>>,
    retries: Mutex<Vec<RetryEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<QualityReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn retries(&self) -> Vec<RetryEntry> {
        self.retries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReportSink for MemorySink {
    fn persist(&self, report: &QualityReport) -> Result<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }

    fn on_retry(&self, entry: &RetryEntry) {
        self.retries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

static_assertions::assert_impl_all!(JsonFileSink: Send, Sync);
static_assertions::assert_impl_all!(MemorySink: Send, Sync);
