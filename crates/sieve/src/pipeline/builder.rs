//! The `Pipeline` entry point and its builder.

use crate::config::{ConfigValidationError, StrategyConfig};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::pipeline::orchestrator::{RecoveryOrchestrator, RunOutput};
use crate::pipeline::progress::{CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate};
use crate::pipeline::stage::{Stage, default_stages};
use crate::reporting::ReportSink;
use std::sync::Arc;

/// A configured data-quality pipeline.
///
/// Use [`Pipeline::builder()`] to create one. A pipeline holds no per-run
/// state, so one value can run any number of datasets, including from
/// several threads at once.
///
/// # Example
///
/// ```rust,ignore
/// use sieve::{CancellationToken, JsonFileSink, Pipeline, StrategyConfig};
///
/// let token = CancellationToken::new();
///
/// let output = Pipeline::builder()
///     .config(StrategyConfig::default())
///     .cancellation_token(token.clone())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .sink(JsonFileSink::new("output/report.json"))
///     .build()?
///     .run(dataset)?;
///
/// println!("{}: {} findings", output.outcome, output.report.finding_count());
/// ```
pub struct Pipeline {
    config: StrategyConfig,
    stages: Vec<Arc<dyn Stage>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    sinks: Vec<Arc<dyn ReportSink>>,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Run the dataset through every stage.
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::InvalidConfig`](crate::SieveError::InvalidConfig)
    /// when the configuration references columns the dataset lacks or
    /// applies a strategy to a column of the wrong type. Every other result,
    /// including an aborted or cancelled run, is `Ok` with the outcome set.
    pub fn run(&self, dataset: Dataset) -> Result<RunOutput> {
        let mut orchestrator = RecoveryOrchestrator::new(
            &self.config,
            &self.stages,
            &self.cancellation_token,
            self.progress_reporter.as_deref(),
            &self.sinks,
        );
        orchestrator.run(dataset)
    }

    #[cfg(test)]
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<StrategyConfig>,
    stages: Option<Vec<Arc<dyn Stage>>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
    sinks: Vec<Arc<dyn ReportSink>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the strategy configuration. Defaults to [`StrategyConfig::default()`].
    pub fn config(mut self, config: StrategyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the resolver stages.
    ///
    /// Stages run in the given order. Defaults to missing values, outliers,
    /// then deduplication.
    pub fn stages(mut self, stages: Vec<Arc<dyn Stage>>) -> Self {
        self.stages = Some(stages);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// Convenience over [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token.
    ///
    /// Cancellation is checked after each stage's validation gate; the run
    /// then stops with [`Outcome::Cancelled`](crate::Outcome::Cancelled) and
    /// the dataset as left by the last accepted stage.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Add a sink for the finalized report. May be called more than once.
    pub fn sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a shared sink, e.g. a [`MemorySink`](crate::MemorySink) the caller
    /// keeps a handle to.
    pub fn shared_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid on its own terms.
    /// Checks against a dataset happen when the pipeline runs.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            stages: self.stages.unwrap_or_else(default_stages),
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            sinks: self.sinks,
        })
    }
}
