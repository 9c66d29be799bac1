//! Error types for the sharekit core.

use thiserror::Error;

/// Errors raised by the core domain model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid token kind: {0}")]
    InvalidKind(String),

    #[error("invalid visibility tier: {0}")]
    InvalidTier(String),

    #[error("invalid capability: {0}")]
    InvalidCapability(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("malformed value: {0}")]
    Malformed(String),
}
