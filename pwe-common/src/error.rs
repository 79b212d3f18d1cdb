//! Common error types for the menu tooling

use thiserror::Error;

/// Common result type for menu tooling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the menu tooling crates
#[derive(Error, Debug)]
pub enum Error {
    /// Precondition violation: negative or non-numeric price, unknown
    /// platform, malformed document shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local store error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transport failure talking to the remote store
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store answered with a non-success status
    #[error("Store error {status}: {message}")]
    Store { status: u16, message: String },

    /// Document body could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// True for precondition violations raised by the pricing core
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}
