//! Progress reporting and cancellation support for the pipeline.
//!
//! Cancellation is cooperative: the orchestrator checks the token after each
//! validation gate and stops before the next stage begins. A stage that has
//! started always runs to completion.
//!
//! # Example
//!
//! ```rust,ignore
//! use sieve::{CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let output = Pipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.phase, update.message);
//!     })
//!     .build()
//!     .run(dataset)?;
//! ```

use crate::types::StageKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phases of a pipeline run, as seen by progress listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Validating configuration against the dataset
    Initializing,
    /// Profiling the input dataset
    Profiling,
    /// Resolving missing values
    MissingValues,
    /// Resolving outliers
    Outliers,
    /// Removing duplicate records
    Deduplication,
    /// Final profile and report assembly
    Reporting,
    /// Run completed (fully or partially)
    Complete,
    /// Run was cancelled
    Cancelled,
    /// Run aborted after exhausting retries
    Aborted,
}

impl RunPhase {
    /// Returns a human-readable name for the phase.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Profiling => "Profiling Dataset",
            Self::MissingValues => "Resolving Missing Values",
            Self::Outliers => "Resolving Outliers",
            Self::Deduplication => "Removing Duplicates",
            Self::Reporting => "Assembling Report",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Aborted => "Aborted",
        }
    }

    /// Typical share of this phase in a run (0.0 - 1.0).
    ///
    /// Weights of the working phases sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Profiling => 0.13,
            Self::MissingValues => 0.25,
            Self::Outliers => 0.25,
            Self::Deduplication => 0.20,
            Self::Reporting => 0.15,
            Self::Complete | Self::Cancelled | Self::Aborted => 0.0,
        }
    }

    /// Cumulative progress at the start of this phase.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Profiling => 0.02,
            Self::MissingValues => 0.15,
            Self::Outliers => 0.40,
            Self::Deduplication => 0.65,
            Self::Reporting => 0.85,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Aborted => 0.0,
        }
    }
}

impl From<StageKind> for RunPhase {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Profiling => Self::Profiling,
            StageKind::MissingValues => Self::MissingValues,
            StageKind::Outliers => Self::Outliers,
            StageKind::Deduplication => Self::Deduplication,
        }
    }
}

/// Progress update emitted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: RunPhase,

    /// Optional detail, e.g. "attempt 2/3"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current phase (0.0 - 1.0)
    pub phase_progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    pub fn new(phase: RunPhase, phase_progress: f32, message: impl Into<String>) -> Self {
        let progress = phase.base_progress() + (phase.weight() * phase_progress);
        Self {
            phase,
            detail: None,
            progress: progress.clamp(0.0, 1.0),
            phase_progress: phase_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(RunPhase::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(RunPhase::Cancelled, 0.0, "Pipeline cancelled")
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(RunPhase::Aborted, 0.0, message)
    }
}

/// Receiver of progress updates.
///
/// Implementations must be `Send + Sync` so a run can execute on a worker
/// thread while updates are consumed elsewhere.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running pipeline between stages.
///
/// Clones share the same flag; call [`cancel()`](Self::cancel) from any
/// thread.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancellation_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(RunPhase::MissingValues, 0.5, "Resolving...");
        assert_eq!(update.phase, RunPhase::MissingValues);
        assert!(update.detail.is_none());
        assert_eq!(update.phase_progress, 0.5);
        assert!((update.progress - 0.275).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done!");
        assert_eq!(update.phase, RunPhase::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(RunPhase::Profiling, 0.5, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_phase_weights_sum() {
        let phases = [
            RunPhase::Initializing,
            RunPhase::Profiling,
            RunPhase::MissingValues,
            RunPhase::Outliers,
            RunPhase::Deduplication,
            RunPhase::Reporting,
        ];

        let total_weight: f32 = phases.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");
    }

    #[test]
    fn test_phase_base_progress_is_cumulative() {
        let phases = [
            RunPhase::Initializing,
            RunPhase::Profiling,
            RunPhase::MissingValues,
            RunPhase::Outliers,
            RunPhase::Deduplication,
            RunPhase::Reporting,
        ];
        for pair in phases.windows(2) {
            let expected = pair[0].base_progress() + pair[0].weight();
            assert!((pair[1].base_progress() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_progress_update_json_serialization() {
        let update = ProgressUpdate::new(RunPhase::Deduplication, 1.0, "done")
            .with_detail("attempt 1/3");
        let json = serde_json::to_string(&update).expect("Should serialize");
        assert!(json.contains("\"phase\":\"deduplication\""));
        assert!(json.contains("\"detail\":\"attempt 1/3\""));
    }

    #[test]
    fn test_cancellation_across_threads() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            token_clone.is_cancelled()
        });

        token.cancel();

        let was_cancelled = handle.join().expect("Thread should not panic");
        assert!(was_cancelled, "Cancellation should be visible across threads");
    }
}
