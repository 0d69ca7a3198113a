//! Run reports and the sinks they are handed to.
//!
//! A [`QualityReport`] is assembled by the orchestrator during a run and
//! finalized when the run terminates, whatever the outcome. Every configured
//! [`ReportSink`] then receives the finalized report.
//!
//! # Example
//!
//! ```rust,ignore
//! use sieve::{JsonFileSink, Pipeline, StrategyConfig};
//!
//! let output = Pipeline::builder()
//!     .config(StrategyConfig::default())
//!     .sink(JsonFileSink::new("output/report.json"))
//!     .build()
//!     .run(dataset)?;
//!
//! println!("{}", output.report.to_json_pretty()?);
//! ```

mod report;
mod sink;

pub use report::{QualityReport, ReportSummary};
pub use sink::{JsonFileSink, MemorySink, ReportSink, TracingSink};
