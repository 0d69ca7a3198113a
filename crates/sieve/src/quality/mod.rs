//! Post-stage validation.
//!
//! The cross validator re-measures a stage's output and reports pass/fail per
//! check. It never halts the pipeline; the orchestrator decides what a
//! failure means.

mod validator;

pub use validator::{CrossValidator, ValidationScope};
