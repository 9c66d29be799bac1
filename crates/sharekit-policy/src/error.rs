//! Error types for the policy module.

use thiserror::Error;

/// Errors that can occur during visibility evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The connection oracle failed to answer.
    #[error("connection oracle error: {0}")]
    Oracle(String),

    /// A custom rule predicate failed.
    #[error("custom rule error: {0}")]
    CustomRule(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] sharekit_core::CoreError),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
