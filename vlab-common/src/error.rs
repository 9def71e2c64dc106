//! Common error types for the Virtual Lab service

use thiserror::Error;

/// Common result type for Virtual Lab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the server and the stream client
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

    /// Caller lacks an identity or write access to the resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Entity absent, or invisible to the caller (deliberately conflated
    /// so private resources are indistinguishable from missing ones)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or malformed request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP transport error (server bind, stream connection)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
