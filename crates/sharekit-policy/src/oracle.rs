//! Connection oracle: the abstract interface to the relationship graph.
//!
//! The policy engine never traverses the connection graph itself; it asks
//! an injected oracle. This keeps the engine decoupled from however the
//! graph is stored.

use async_trait::async_trait;

use sharekit_core::UserId;

use crate::error::Result;

/// Answers relationship-graph queries between two identities.
#[async_trait]
pub trait ConnectionOracle: Send + Sync {
    /// Are the two users directly connected?
    async fn are_connected(&self, a: UserId, b: UserId) -> Result<bool>;

    /// How many connections do the two users share?
    async fn mutual_count(&self, a: UserId, b: UserId) -> Result<u64>;
}

/// An oracle that knows nobody. Useful as a conservative default.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyOracle;

#[async_trait]
impl ConnectionOracle for EmptyOracle {
    async fn are_connected(&self, _a: UserId, _b: UserId) -> Result<bool> {
        Ok(false)
    }

    async fn mutual_count(&self, _a: UserId, _b: UserId) -> Result<u64> {
        Ok(0)
    }
}
