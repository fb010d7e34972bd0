//! Storage error handling
//!
//! Typed errors for the record store, classified from I/O and SQLite
//! failures with enough context to act on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during record store operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record that was expected to exist is missing
    #[error("Record not found: '{id}'")]
    RecordNotFound { id: String },

    /// A stored record could not be decoded
    #[error("Invalid record '{id}': {details}")]
    InvalidRecord { id: String, details: String },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Create an error from an I/O error with path context
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ => StorageError::Io(error),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
