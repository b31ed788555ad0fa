//! Error types for the file discovery system.

use thiserror::Error;

/// Errors that can occur while scanning and watching files.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid glob pattern or matcher expression.
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A scan could not produce a snapshot.
    #[error("Scan error: {0}")]
    Scan(String),

    /// Event channel error.
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Result type for file discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert glob pattern errors to our error type.
impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::Pattern(err.to_string())
    }
}

/// Convert regex errors to our error type.
impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern(err.to_string())
    }
}

/// Convert config validation errors to our error type.
impl From<crate::config::ValidationError> for Error {
    fn from(err: crate::config::ValidationError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convert flume send errors to our error type.
impl<T> From<flume::SendError<T>> for Error {
    fn from(err: flume::SendError<T>) -> Self {
        Error::Channel(format!("Channel send error: {}", err))
    }
}
