//! Error types for the data-quality engine.
//!
//! Only two conditions ever reach the caller as an `Err`: an invalid
//! configuration detected before any stage runs, and failures in the
//! collaborator layer (loading, sinks). Everything that happens inside a
//! stage is captured into the [`QualityReport`](crate::reporting::QualityReport)
//! instead.
//!
//! Errors are serializable so a finished run can embed them in JSON output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the engine.
#[derive(Error, Debug)]
pub enum SieveError {
    /// Configuration references a missing column or mismatched type.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The dataset handle does not satisfy its structural invariant.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Loading input data failed.
    #[error("Failed to load dataset: {0}")]
    LoadFailed(String),

    /// Handing the report to a sink failed.
    #[error("Failed to persist report: {0}")]
    SinkFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SieveError>,
    },
}

impl SieveError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SieveError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidDataset(_) => "INVALID_DATASET",
            Self::LoadFailed(_) => "LOAD_FAILED",
            Self::SinkFailed(_) => "SINK_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means the run never started.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for SieveError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        SieveError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for SieveError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("SieveError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SieveError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SieveError::Polars(e).with_context(context))
    }
}
