//! Error types for seglog
//!
//! Provides a unified error type for all log operations.

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for seglog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    /// Read past the logical end of an index, or no room left to write one.
    #[error("End of data")]
    EndOfData,

    /// No segment in the log owns the requested offset.
    #[error("Offset out of range: {offset}")]
    OffsetOutOfRange { offset: u64 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Resource already closed")]
    Closed,

    #[error("Store poisoned: {0}")]
    Poisoned(String),

    /// Every failure collected while closing several resources.
    #[error("Close failed: {}", join_errors(.0))]
    Close(Vec<LogError>),
}

impl LogError {
    /// True for `EndOfData`
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, LogError::EndOfData)
    }

    /// True for `OffsetOutOfRange`
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, LogError::OffsetOutOfRange { .. })
    }

    /// Fold close results into a single result, keeping every error.
    pub(crate) fn collect(mut errors: Vec<LogError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(LogError::Close(errors)),
        }
    }
}

impl From<bincode::Error> for LogError {
    fn from(err: bincode::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}

impl From<LogError> for std::io::Error {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}

fn join_errors(errors: &[LogError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
