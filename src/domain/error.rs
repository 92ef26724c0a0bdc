//! Domain-level error types for signal-chat-export.
//!
//! Only fatal preconditions are modelled as `AppError`. Row, attachment and
//! merge defects are plain values collected in the export report.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Signal directory or one of its required files is missing.
    #[error("Signal data not found at: {path}")]
    SourceNotFound { path: PathBuf },

    /// The database key could not be read from the Signal config file.
    #[error("Database key unavailable: {message}")]
    KeyUnavailable { message: String },

    /// Producing a decrypted copy of the database failed.
    #[error("Decryption failed: {message}")]
    Decryption {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to open or query the database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or corrupted data that cannot be skipped.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Destination already holds files and `--overwrite` was not given.
    #[error("Output folder '{path}' already exists and is not empty (use --overwrite)")]
    DestinationNotEmpty { path: PathBuf },

    /// The previous export and the destination are the same directory.
    #[error("Cannot merge '{path}' into itself; choose a new destination")]
    MergeIntoSelf { path: PathBuf },

    /// One of the destination and the previous export lies inside the other.
    #[error("Destination '{dest}' and previous export '{old}' must not contain each other")]
    NestedExport { dest: PathBuf, old: PathBuf },
}

impl AppError {
    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
