//! Pipeline module.
//!
//! [`Pipeline`] is the configured entry point; each run is driven by a
//! [`RecoveryOrchestrator`] through the [`Stage`]s in order.

mod builder;
mod orchestrator;
pub mod progress;
mod stage;

pub use builder::{Pipeline, PipelineBuilder};
pub use orchestrator::{OrchestratorState, RecoveryOrchestrator, RunOutput};
pub use progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunPhase,
};
pub use stage::{
    DeduplicationStage, MissingValueStage, OutlierStage, Stage, StageContext, StageResult,
    default_stages,
};
