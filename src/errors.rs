//! Centralized error handling for track_wrapper
//!
//! Every failure is sorted into one of a few classes: bad caller input detected
//! before any external call, a failing external tool, or a NetCDF file that lacks
//! the structure the pipeline needs. Nothing is retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for track_wrapper operations
#[derive(Error, Debug)]
pub enum TrackError {
    /// Malformed caller input or missing installation, detected before running anything
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// An external tool exited with an unexpected status or printed something unparsable
    #[error("External tool '{tool}' failed: {message}")]
    ExternalTool { tool: String, message: String },

    /// An external tool ran past its time limit and was killed
    #[error("External tool '{tool}' timed out after {seconds} s")]
    Timeout { tool: String, seconds: u64 },

    /// Expected NetCDF structure is absent
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// No variable role could be assigned
    #[error("Unrecognized variable set {variables:?}")]
    UnrecognizedVariables { variables: Vec<String> },

    /// A file an external tool should have produced does not exist
    #[error("Expected output '{}' is missing", path.display())]
    MissingOutput { path: PathBuf },

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Coarse error classes used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Precondition,
    ExternalTool,
    DataFormat,
    Io,
}

impl TrackError {
    pub fn external(tool: impl Into<String>, message: impl Into<String>) -> Self {
        TrackError::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackError::Precondition(_) => ErrorCategory::Precondition,
            TrackError::ExternalTool { .. }
            | TrackError::Timeout { .. }
            | TrackError::MissingOutput { .. } => ErrorCategory::ExternalTool,
            TrackError::DataFormat(_)
            | TrackError::UnrecognizedVariables { .. }
            | TrackError::NetCDF(_) => ErrorCategory::DataFormat,
            TrackError::Io(_) => ErrorCategory::Io,
            TrackError::Config(_) => ErrorCategory::Precondition,
        }
    }
}

/// Result type alias for track_wrapper operations
pub type Result<T> = std::result::Result<T, TrackError>;
