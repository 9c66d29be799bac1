//! The visibility decision cascade.
//!
//! Evaluates whether a viewer may access a profile absent any token.
//! The cascade is a fixed priority order, first match wins:
//!
//! 1. owner            -> allow (`owner`)
//! 2. blocklist        -> deny (`blocked`), even on public profiles
//! 3. public tier      -> allow (`public`)
//! 4. connections tier -> oracle.are_connected (`connection` / `not_connected`)
//! 5. network tier     -> oracle.mutual_count > 0 (`network` / `not_in_network`)
//! 6. private tier     -> deny (`private`), no exceptions
//! 7. custom tier      -> pluggable predicate (`custom_rule` either way)
//!
//! Anonymous viewers are non-members of the graph: only the public arm
//! can allow them, and the blocklist check is a no-op.

use async_trait::async_trait;

use sharekit_core::{AccessReason, UserId, VisibilityPolicy, VisibilityTier};

use crate::error::Result;
use crate::oracle::ConnectionOracle;

/// Outcome of a visibility evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl PolicyDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: AccessReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// A pluggable predicate for the `custom` tier.
///
/// The rule payload is opaque structured data owned by the profile; no
/// rule language is defined here. Implementations decide over
/// (viewer, owner, payload).
#[async_trait]
pub trait CustomRule: Send + Sync {
    async fn evaluate(
        &self,
        viewer: UserId,
        owner: UserId,
        rules: &serde_json::Value,
        oracle: &dyn ConnectionOracle,
    ) -> Result<bool>;
}

/// The default custom rule: behaves like the connections tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionsFallbackRule;

#[async_trait]
impl CustomRule for ConnectionsFallbackRule {
    async fn evaluate(
        &self,
        viewer: UserId,
        owner: UserId,
        _rules: &serde_json::Value,
        oracle: &dyn ConnectionOracle,
    ) -> Result<bool> {
        oracle.are_connected(viewer, owner).await
    }
}

/// Evaluates the visibility cascade for (profile, viewer) pairs.
pub struct PolicyEngine {
    custom_rule: Box<dyn CustomRule>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    /// Engine with the default custom-rule fallback.
    pub fn new() -> Self {
        Self {
            custom_rule: Box::new(ConnectionsFallbackRule),
        }
    }

    /// Engine with a caller-supplied custom-rule predicate.
    pub fn with_custom_rule(custom_rule: Box<dyn CustomRule>) -> Self {
        Self { custom_rule }
    }

    /// Run the cascade.
    ///
    /// `owner` is the identity owning the profile; `viewer` is `None`
    /// for anonymous requests.
    pub async fn evaluate(
        &self,
        policy: &VisibilityPolicy,
        owner: UserId,
        viewer: Option<UserId>,
        oracle: &dyn ConnectionOracle,
    ) -> Result<PolicyDecision> {
        // 1. Owner bypasses everything.
        if viewer == Some(owner) {
            return Ok(PolicyDecision::allow(AccessReason::Owner));
        }

        // 2. Blocklist is absolute, checked before any tier.
        if let Some(viewer) = viewer {
            if policy.is_blocked(viewer) {
                tracing::debug!(%viewer, profile = %policy.profile, "viewer is blocklisted");
                return Ok(PolicyDecision::deny(AccessReason::Blocked));
            }
        }

        match policy.tier {
            // 3.
            VisibilityTier::Public => Ok(PolicyDecision::allow(AccessReason::Public)),

            // 4.
            VisibilityTier::Connections => match viewer {
                Some(viewer) if oracle.are_connected(viewer, owner).await? => {
                    Ok(PolicyDecision::allow(AccessReason::Connection))
                }
                _ => Ok(PolicyDecision::deny(AccessReason::NotConnected)),
            },

            // 5.
            VisibilityTier::Network => match viewer {
                Some(viewer) if oracle.mutual_count(viewer, owner).await? > 0 => {
                    Ok(PolicyDecision::allow(AccessReason::Network))
                }
                _ => Ok(PolicyDecision::deny(AccessReason::NotInNetwork)),
            },

            // 6.
            VisibilityTier::Private => Ok(PolicyDecision::deny(AccessReason::Private)),

            // 7.
            VisibilityTier::Custom => match viewer {
                Some(viewer) => {
                    let allowed = self
                        .custom_rule
                        .evaluate(viewer, owner, &policy.custom_rules, oracle)
                        .await?;
                    // `custom_rule` is the reason on both branches; the
                    // allowed flag carries the verdict.
                    if allowed {
                        Ok(PolicyDecision::allow(AccessReason::CustomRule))
                    } else {
                        Ok(PolicyDecision::deny(AccessReason::CustomRule))
                    }
                }
                None => Ok(PolicyDecision::deny(AccessReason::CustomRule)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EmptyOracle;
    use sharekit_core::ProfileId;
    use std::collections::HashSet;

    /// Oracle with a fixed connection set and mutual counts.
    struct FixedOracle {
        connected: HashSet<(UserId, UserId)>,
        mutuals: u64,
    }

    impl FixedOracle {
        fn connecting(pairs: &[(UserId, UserId)]) -> Self {
            let mut connected = HashSet::new();
            for &(a, b) in pairs {
                connected.insert((a, b));
                connected.insert((b, a));
            }
            Self {
                connected,
                mutuals: 0,
            }
        }
    }

    #[async_trait]
    impl ConnectionOracle for FixedOracle {
        async fn are_connected(&self, a: UserId, b: UserId) -> Result<bool> {
            Ok(self.connected.contains(&(a, b)))
        }

        async fn mutual_count(&self, _a: UserId, _b: UserId) -> Result<u64> {
            Ok(self.mutuals)
        }
    }

    fn policy_with_tier(tier: VisibilityTier) -> VisibilityPolicy {
        let mut policy = VisibilityPolicy::new(ProfileId(1), 0);
        policy.tier = tier;
        policy
    }

    const OWNER: UserId = UserId(1);
    const VIEWER: UserId = UserId(2);

    #[tokio::test]
    async fn test_owner_always_allowed() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Private);

        let decision = engine
            .evaluate(&policy, OWNER, Some(OWNER), &EmptyOracle)
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::Owner);
    }

    #[tokio::test]
    async fn test_blocklist_overrides_public() {
        let engine = PolicyEngine::new();
        let mut policy = policy_with_tier(VisibilityTier::Public);
        policy.block(VIEWER);

        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &EmptyOracle)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::Blocked);
    }

    #[tokio::test]
    async fn test_public_allows_anonymous() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Public);

        let decision = engine
            .evaluate(&policy, OWNER, None, &EmptyOracle)
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::Public);
    }

    #[tokio::test]
    async fn test_connections_tier() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Connections);

        let disconnected = FixedOracle::connecting(&[]);
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &disconnected)
            .await
            .unwrap();
        assert_eq!(decision.reason, AccessReason::NotConnected);
        assert!(!decision.allowed);

        let connected = FixedOracle::connecting(&[(OWNER, VIEWER)]);
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &connected)
            .await
            .unwrap();
        assert_eq!(decision.reason, AccessReason::Connection);
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_connections_tier_denies_anonymous() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Connections);

        let decision = engine
            .evaluate(&policy, OWNER, None, &EmptyOracle)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::NotConnected);
    }

    #[tokio::test]
    async fn test_network_tier_needs_mutuals() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Network);

        let mut oracle = FixedOracle::connecting(&[]);
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &oracle)
            .await
            .unwrap();
        assert_eq!(decision.reason, AccessReason::NotInNetwork);

        oracle.mutuals = 3;
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &oracle)
            .await
            .unwrap();
        assert_eq!(decision.reason, AccessReason::Network);
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_private_denies_everyone_but_owner() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Private);

        let oracle = FixedOracle::connecting(&[(OWNER, VIEWER)]);
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &oracle)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::Private);
    }

    #[tokio::test]
    async fn test_custom_tier_falls_back_to_connections() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Custom);

        let connected = FixedOracle::connecting(&[(OWNER, VIEWER)]);
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &connected)
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::CustomRule);

        let disconnected = FixedOracle::connecting(&[]);
        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &disconnected)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::CustomRule);
    }

    #[tokio::test]
    async fn test_custom_tier_deny_keeps_the_custom_rule_reason() {
        let engine = PolicyEngine::new();
        let policy = policy_with_tier(VisibilityTier::Custom);

        let decision = engine
            .evaluate(&policy, OWNER, Some(VIEWER), &EmptyOracle)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_str(), "custom_rule");

        let decision = engine
            .evaluate(&policy, OWNER, None, &EmptyOracle)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_str(), "custom_rule");
    }
}
