//! Error types for the access gate.

use sharekit_core::CoreError;
use sharekit_policy::PolicyError;
use sharekit_store::StoreError;
use thiserror::Error;

/// Errors that can occur during gate operations.
#[derive(Debug, Error)]
pub enum GateError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Policy evaluation error.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Domain model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The named entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The caller may not perform this management operation.
    /// `reason` is machine-readable; the message is for humans.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The input failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation requires an authenticated caller.
    ///
    /// The gate itself never produces this: management operations take a
    /// typed `UserId`, so a missing identity is unrepresentable here. The
    /// transport layer maps requests lacking one to this variant (401)
    /// before reaching the gate.
    #[error("authentication required")]
    Unauthenticated,
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
