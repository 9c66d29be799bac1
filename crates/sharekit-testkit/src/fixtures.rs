//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sharekit::{AccessGate, GateConfig};
use sharekit_core::{IssueParams, ProfileId, ShareToken, TokenKind, UserId};
use sharekit_policy::{ConnectionOracle, PolicyError, Result as PolicyResult};
use sharekit_store::MemoryStore;

/// A programmable connection graph for tests.
///
/// Edges are undirected; mutual counts are set per unordered pair.
/// Interior mutability lets a test flip connections mid-scenario while
/// the gate holds an `Arc` to the same oracle.
#[derive(Default)]
pub struct StaticOracle {
    edges: RwLock<HashSet<(UserId, UserId)>>,
    mutuals: RwLock<HashMap<(UserId, UserId), u64>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect two users (both directions).
    pub fn connect(&self, a: UserId, b: UserId) {
        let mut edges = self.edges.write().expect("oracle lock");
        edges.insert((a, b));
        edges.insert((b, a));
    }

    /// Remove the connection between two users.
    pub fn disconnect(&self, a: UserId, b: UserId) {
        let mut edges = self.edges.write().expect("oracle lock");
        edges.remove(&(a, b));
        edges.remove(&(b, a));
    }

    /// Set the mutual-connection count for a pair.
    pub fn set_mutuals(&self, a: UserId, b: UserId, count: u64) {
        let mut mutuals = self.mutuals.write().expect("oracle lock");
        mutuals.insert((a, b), count);
        mutuals.insert((b, a), count);
    }
}

#[async_trait]
impl ConnectionOracle for StaticOracle {
    async fn are_connected(&self, a: UserId, b: UserId) -> PolicyResult<bool> {
        let edges = self
            .edges
            .read()
            .map_err(|e| PolicyError::Oracle(e.to_string()))?;
        Ok(edges.contains(&(a, b)))
    }

    async fn mutual_count(&self, a: UserId, b: UserId) -> PolicyResult<u64> {
        let mutuals = self
            .mutuals
            .read()
            .map_err(|e| PolicyError::Oracle(e.to_string()))?;
        Ok(mutuals.get(&(a, b)).copied().unwrap_or(0))
    }
}

/// A test fixture with an in-memory gate and a programmable oracle.
pub struct TestFixture {
    pub oracle: Arc<StaticOracle>,
    pub gate: AccessGate<MemoryStore>,
}

impl TestFixture {
    /// Create a new fixture with an empty connection graph.
    pub fn new() -> Self {
        let oracle = Arc::new(StaticOracle::new());
        let gate = AccessGate::new(
            MemoryStore::new(),
            oracle.clone() as Arc<dyn ConnectionOracle>,
            GateConfig::default(),
        );
        Self { oracle, gate }
    }

    /// Issue a view-only token for a profile with the given cap.
    pub async fn issue_view_token(
        &self,
        profile: ProfileId,
        creator: UserId,
        max_views: Option<u32>,
    ) -> ShareToken {
        let mut params = IssueParams::new(TokenKind::View, "test token");
        params.max_views = max_views;
        self.gate
            .issue_token(profile, creator, params)
            .await
            .expect("token issuance")
    }

    /// Issue a token restricted to the given referer domains.
    pub async fn issue_domain_token(
        &self,
        profile: ProfileId,
        creator: UserId,
        domains: &[&str],
    ) -> ShareToken {
        let params = IssueParams::new(TokenKind::View, "domain token")
            .with_allowed_domains(domains.iter().map(|d| d.to_string()).collect());
        self.gate
            .issue_token(profile, creator, params)
            .await
            .expect("token issuance")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_oracle_is_symmetric() {
        let oracle = StaticOracle::new();
        oracle.connect(UserId(1), UserId(2));

        assert!(oracle.are_connected(UserId(1), UserId(2)).await.unwrap());
        assert!(oracle.are_connected(UserId(2), UserId(1)).await.unwrap());
        assert!(!oracle.are_connected(UserId(1), UserId(3)).await.unwrap());

        oracle.disconnect(UserId(1), UserId(2));
        assert!(!oracle.are_connected(UserId(1), UserId(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_fixture_issues_tokens() {
        let fixture = TestFixture::new();
        let token = fixture
            .issue_view_token(ProfileId(1), UserId(1), Some(5))
            .await;
        assert_eq!(token.max_views, Some(5));
        assert_eq!(token.secret.as_str().len(), 64);
    }
}
