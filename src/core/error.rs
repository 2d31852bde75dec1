/// Error Module
///
/// Structured error type shared by every fallible operation of the wrapper.
use thiserror::Error;

/// Error kinds surfaced by the database handle.
///
/// No operation retries; the host decides what to do with each kind.
#[derive(Error, Debug)]
pub enum DbError {
    /// Unknown driver, open failure or failed liveness check
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement preparation or execution failure
    #[error("Query error: {0}")]
    Query(String),

    /// The statement produced a result with no columns at all
    #[error("Columns error: {0}")]
    Columns(String),

    /// A column value could not be materialised as text
    #[error("Scan error: {0}")]
    Scan(String),

    /// No handle was attached to the context
    #[error("No database handle in context")]
    NoHandle,

    /// The statement did not produce a new row identifier
    #[error("Insert id error: {0}")]
    InsertId(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DbError>;
