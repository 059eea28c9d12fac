//! Error types for stowage.

use thiserror::Error;

use crate::models::TableRef;

/// Result type alias using stowage's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stowage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Table has no visible columns in the catalog
    #[error("Table not found in catalog: {0}")]
    SchemaNotFound(TableRef),

    /// Reconciliation left nothing to copy
    #[error("No transferable columns from {from} to {to}")]
    EmptyPlan { from: TableRef, to: TableRef },

    /// Identifier or literal failed the allow-list check
    #[error("Unsafe identifier: {0}")]
    UnsafeIdentifier(String),

    /// Copy statement failed and was rolled back
    #[error("Archival into {destination} failed: {cause}")]
    ArchivalExecution {
        destination: TableRef,
        #[source]
        cause: Box<Error>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload could not be decoded into records
    #[error("Payload error: {0}")]
    Payload(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a storage failure raised while copying into `destination`.
    pub fn archival_execution(destination: TableRef, cause: Error) -> Self {
        Error::ArchivalExecution {
            destination,
            cause: Box::new(cause),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
