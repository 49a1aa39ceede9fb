//! Common error types for BandSync

use thiserror::Error;

/// Common result type for BandSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the sync crates
///
/// The normalizer and the resync coordinator never produce these; they are
/// reserved for configuration, local store access and audit-log replay.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local store rejected an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested behaviour is recognised but not implemented
    #[error("Unsupported: {0}")]
    Unsupported(String),
}
