//! Common error types for fixtura

use thiserror::Error;

/// Common result type for fixtura operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the fixtura crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store could not be reached (connection refused, file cannot be opened, ...)
    #[error("Resource unreachable: {0}")]
    Unreachable(String),

    /// The store is not in the expected clean state after a reset
    #[error("Resource not in clean state: {0}")]
    DirtyState(String),

    /// The store (or its handle) has already been released
    #[error("Resource already released: {0}")]
    ResourceGone(String),

    /// Invalid schema definition or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
