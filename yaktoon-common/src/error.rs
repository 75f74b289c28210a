//! Common error types for Yaktoon

use thiserror::Error;

/// Common result type for Yaktoon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Yaktoon services
#[derive(Error, Debug)]
pub enum Error {
    /// Redis operation error (wraps redis::RedisError)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Store-level error that did not come from Redis (e.g. WRONGTYPE in the memory store)
    #[error("Store error: {0}")]
    Store(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding of a stored value failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
