//! Error types for FieldSense

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldsenseError {
    // Imagery errors
    #[error("No usable imagery within the last {horizon_days} days")]
    NoImageryAvailable { horizon_days: u32 },

    // Computation errors
    #[error("Degenerate statistics during {stage}: {reason}")]
    DegenerateStatistics { stage: String, reason: String },

    #[error("Raster engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    // Storage errors
    #[error("Metadata store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Failed to export {output} to {path}: {reason}")]
    ExportFailure {
        output: String,
        path: PathBuf,
        reason: String,
    },

    // Input errors
    #[error("Invalid area of interest: {reason}")]
    InvalidGeometry { reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification callers use to decide between retrying later and
/// retrying with a different area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No imagery for the area; retry with a different area or later.
    NoData,
    /// The computation itself failed.
    Computation,
    /// Persistence failed; the result may not be cached.
    Storage,
    /// The request was malformed.
    InvalidInput,
}

impl FieldsenseError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FieldsenseError::NoImageryAvailable { .. } => ErrorCategory::NoData,
            FieldsenseError::StoreUnavailable { .. } => ErrorCategory::Storage,
            FieldsenseError::InvalidGeometry { .. } | FieldsenseError::InvalidRequest { .. } => {
                ErrorCategory::InvalidInput
            }
            FieldsenseError::DegenerateStatistics { .. }
            | FieldsenseError::EngineUnavailable { .. }
            | FieldsenseError::ExportFailure { .. }
            | FieldsenseError::ConfigMissing { .. }
            | FieldsenseError::ConfigInvalid { .. }
            | FieldsenseError::Io(_)
            | FieldsenseError::Serialization(_) => ErrorCategory::Computation,
        }
    }

    pub fn degenerate(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldsenseError::DegenerateStatistics { stage: stage.into(), reason: reason.into() }
    }

    pub fn engine(reason: impl Into<String>) -> Self {
        FieldsenseError::EngineUnavailable { reason: reason.into() }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        FieldsenseError::StoreUnavailable { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, FieldsenseError>;
