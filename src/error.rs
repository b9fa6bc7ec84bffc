//! Common error types for pressroom

use thiserror::Error;

/// Common result type for pressroom operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the manifest, resolver and repository layers
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

    /// Manifest document failed schema validation
    #[error("Invalid manifest: {0}")]
    Validation(String),

    /// Duration string uses a unit other than days or weeks
    #[error("Unsupported duration unit: {0}")]
    UnsupportedDurationUnit(String),

    /// A manifest entry refers to a group or recommender name that does not exist
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// A uniqueness constraint was violated on write; the transaction was rolled back
    #[error("Persistence conflict: {0}")]
    Conflict(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
