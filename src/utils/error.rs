//! Error types and handling
//!
//! Common error types used across the recorder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Failed to create session directory {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Writer closed: {0}")]
    Closed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoggerError {
    /// Stable code for event consumers
    pub fn code(&self) -> &'static str {
        match self {
            LoggerError::DirectoryCreation { .. } => "DIRECTORY_CREATION_ERROR",
            LoggerError::Io(_) => "IO_ERROR",
            LoggerError::Encode(_) => "ENCODE_ERROR",
            LoggerError::Config(_) => "CONFIG_ERROR",
            LoggerError::Closed(_) => "CLOSED_ERROR",
            LoggerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Error payload broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
}

impl From<&LoggerError> for ErrorReport {
    fn from(error: &LoggerError) -> Self {
        ErrorReport {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using LoggerError
pub type LoggerResult<T> = Result<T, LoggerError>;
