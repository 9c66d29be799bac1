//! The AccessGate: unified API for the sharekit system.
//!
//! The gate brings together token storage, the visibility cascade, and
//! the audit trail into a cohesive interface for building applications.
//! Every access decision flows through [`AccessGate::check_access`],
//! which emits exactly one audit record per decision.

use std::sync::Arc;

use sharekit_core::{
    now_millis, AccessKind, AccessOutcome, AccessReason, Capability, IssueParams, NewAccessRecord,
    PolicyUpdate, ProfileId, Share, ShareId, ShareParams, ShareStatus, ShareToken, TokenId,
    TokenUpdate, UserId, VisibilityPolicy, MILLIS_PER_DAY,
};
use sharekit_policy::{ConnectionOracle, PolicyEngine};
use sharekit_store::{Store, TokenInsert};

use crate::analytics::{self, ProfileAnalytics};
use crate::error::{GateError, Result};
use crate::request::{host_matches, referer_host, AccessRequest};

/// Configuration for the gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Token lifetime applied when issuance does not specify one.
    pub default_ttl_days: i64,
    /// How many recent records analytics aggregates over.
    pub analytics_window: usize,
    /// Length of the recent-activity slice in analytics.
    pub recent_activity_limit: usize,
    /// Agent strings in analytics are truncated to this many chars.
    pub agent_max_chars: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_ttl_days: sharekit_core::DEFAULT_TTL_DAYS,
            analytics_window: 100,
            recent_activity_limit: 20,
            agent_max_chars: 100,
        }
    }
}

/// The result of one access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Machine-readable cause of the decision.
    pub reason: AccessReason,
    /// The recorded outcome: `success` on allow; on the token path a
    /// revoked token records `revoked` and an expired or exhausted one
    /// `expired`; every other denial records `denied`.
    pub outcome: AccessOutcome,
    /// The token that authorized (or failed to authorize) the access.
    pub via_token: Option<TokenId>,
    /// The HTTP status the decision maps to: 200 allow, 403 deny.
    pub status_code: u16,
}

impl Decision {
    fn allow(reason: AccessReason, via_token: Option<TokenId>) -> Self {
        Self {
            allowed: true,
            reason,
            outcome: AccessOutcome::Success,
            via_token,
            status_code: 200,
        }
    }

    fn deny(reason: AccessReason, via_token: Option<TokenId>) -> Self {
        Self::deny_as(reason, AccessOutcome::Denied, via_token)
    }

    fn deny_as(reason: AccessReason, outcome: AccessOutcome, via_token: Option<TokenId>) -> Self {
        Self {
            allowed: false,
            reason,
            outcome,
            via_token,
            status_code: 403,
        }
    }
}

/// The main gate struct.
///
/// Provides a unified API for:
/// - Issuing and managing share tokens
/// - Deciding access requests (token path and visibility cascade)
/// - Reading and writing visibility policies
/// - Managing shares
/// - Audit analytics
pub struct AccessGate<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// The visibility cascade evaluator.
    engine: PolicyEngine,
    /// The connection graph the cascade consults.
    oracle: Arc<dyn ConnectionOracle>,
    /// Configuration.
    config: GateConfig,
}

impl<S: Store> AccessGate<S> {
    /// Create a new gate instance.
    pub fn new(store: S, oracle: Arc<dyn ConnectionOracle>, config: GateConfig) -> Self {
        Self {
            store: Arc::new(store),
            engine: PolicyEngine::new(),
            oracle,
            config,
        }
    }

    /// Replace the default visibility engine (custom-tier predicate).
    pub fn with_engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a new token for `profile`.
    ///
    /// The lifetime is `params.ttl_days` (default from config), capped by
    /// the profile's `max_share_duration_days`. A secret collision is
    /// retried once with a fresh secret.
    pub async fn issue_token(
        &self,
        profile: ProfileId,
        creator: UserId,
        params: IssueParams,
    ) -> Result<ShareToken> {
        let now = now_millis();
        let policy = self.get_or_create_policy(profile, now).await?;

        let ttl_days = params.ttl_days.unwrap_or(self.config.default_ttl_days);
        if ttl_days <= 0 {
            return Err(GateError::Validation(format!(
                "token lifetime must be positive, got {ttl_days} days"
            )));
        }
        let ttl_days = ttl_days.min(i64::from(policy.sharing.max_share_duration_days));

        let mut token = ShareToken {
            id: TokenId(0),
            profile,
            secret: ShareToken::generate_secret(),
            kind: params.kind,
            created_by: creator,
            expires_at: now + ttl_days * MILLIS_PER_DAY,
            active: true,
            capabilities: params.capabilities,
            max_views: params.max_views,
            view_count: 0,
            allowed_domains: params.allowed_domains,
            purpose: params.purpose,
            description: params.description,
            metadata: params.metadata,
            last_used_at: None,
            last_used_address: None,
            created_at: now,
        };

        // One retry on secret collision, then give up.
        for _ in 0..2 {
            match self.store.insert_token(&token).await? {
                TokenInsert::Inserted(id) => {
                    token.id = id;
                    tracing::debug!(token = %id, profile = %profile, "issued share token");
                    return Ok(token);
                }
                TokenInsert::DuplicateSecret => {
                    tracing::warn!(profile = %profile, "token secret collision, regenerating");
                    token.secret = ShareToken::generate_secret();
                }
            }
        }

        Err(GateError::InvalidState(
            "token secret collision persisted after retry".to_string(),
        ))
    }

    /// Get a token by id.
    pub async fn get_token(&self, id: TokenId) -> Result<ShareToken> {
        self.store
            .get_token(id)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("token {id}")))
    }

    /// List a creator's active tokens, most recent first.
    pub async fn list_tokens(&self, creator: UserId) -> Result<Vec<ShareToken>> {
        Ok(self.store.list_tokens_by_creator(creator).await?)
    }

    /// Update a token. Only the creator may do this.
    pub async fn update_token(
        &self,
        id: TokenId,
        caller: UserId,
        update: TokenUpdate,
    ) -> Result<ShareToken> {
        let mut token = self.get_token(id).await?;
        if token.created_by != caller {
            return Err(GateError::Forbidden {
                reason: "not_token_creator".to_string(),
            });
        }

        update.apply(&mut token, now_millis());
        self.store.update_token(&token).await?;
        Ok(token)
    }

    /// Revoke a token. Only the creator may do this. Idempotent.
    pub async fn revoke_token(&self, id: TokenId, caller: UserId) -> Result<()> {
        let token = self.get_token(id).await?;
        if token.created_by != caller {
            return Err(GateError::Forbidden {
                reason: "not_token_creator".to_string(),
            });
        }

        self.store.revoke_token(id).await?;
        tracing::debug!(token = %id, "revoked share token");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide one access request against `profile` (owned by `owner`).
    ///
    /// A valid bearer token authorizes regardless of the visibility tier;
    /// absent a token the visibility cascade decides. Exactly one audit
    /// record is appended per call; audit failures are logged and never
    /// fail the request.
    pub async fn check_access(
        &self,
        profile: ProfileId,
        owner: UserId,
        request: &AccessRequest,
    ) -> Result<Decision> {
        let now = now_millis();

        let decision = match request.bearer_secret() {
            Some(secret) => self.decide_with_token(profile, secret, request, now).await?,
            None => {
                let policy = self.get_or_create_policy(profile, now).await?;
                let outcome = self
                    .engine
                    .evaluate(&policy, owner, request.viewer, self.oracle.as_ref())
                    .await?;
                if outcome.allowed {
                    Decision::allow(outcome.reason, None)
                } else {
                    Decision::deny(outcome.reason, None)
                }
            }
        };

        self.append_audit(profile, request, &decision, now).await;

        tracing::debug!(
            profile = %profile,
            allowed = decision.allowed,
            reason = %decision.reason,
            "access decision"
        );

        Ok(decision)
    }

    /// The token arm of the decision.
    async fn decide_with_token(
        &self,
        profile: ProfileId,
        secret: &str,
        request: &AccessRequest,
        now: i64,
    ) -> Result<Decision> {
        let token = match self.store.get_token_by_secret(secret).await? {
            Some(token) => token,
            None => return Ok(Decision::deny(AccessReason::TokenInvalid, None)),
        };
        let id = token.id;

        if token.profile != profile {
            return Ok(Decision::deny(AccessReason::TokenProfileMismatch, Some(id)));
        }

        if !token.active {
            return Ok(Decision::deny_as(
                AccessReason::TokenInvalid,
                AccessOutcome::Revoked,
                Some(id),
            ));
        }

        if !token.is_valid(now) {
            // Active but failing validation means expiry or an exhausted cap.
            return Ok(Decision::deny_as(
                AccessReason::TokenInvalid,
                AccessOutcome::Expired,
                Some(id),
            ));
        }

        if !token.has_capabilities(&[required_capability(request.kind)]) {
            return Ok(Decision::deny(
                AccessReason::TokenNoViewPermission,
                Some(id),
            ));
        }

        if !token.allowed_domains.is_empty() {
            let matched = referer_host(&request.meta.referer)
                .map(|host| {
                    token
                        .allowed_domains
                        .iter()
                        .any(|domain| host_matches(&host, domain))
                })
                .unwrap_or(false);
            if !matched {
                return Ok(Decision::deny(AccessReason::DomainNotAllowed, Some(id)));
            }
        }

        // Atomic: the cap check and the counter bump happen in the store.
        // Losing the race means the last view went to someone else.
        let origin = (!request.meta.origin_address.is_empty())
            .then_some(request.meta.origin_address.as_str());
        if !self.store.record_token_use(id, now, origin).await? {
            return Ok(Decision::deny_as(
                AccessReason::TokenInvalid,
                AccessOutcome::Expired,
                Some(id),
            ));
        }

        Ok(Decision::allow(AccessReason::TokenAuthorized, Some(id)))
    }

    /// Append the audit record for a decision. Failures are warned, never
    /// propagated.
    async fn append_audit(
        &self,
        profile: ProfileId,
        request: &AccessRequest,
        decision: &Decision,
        now: i64,
    ) {
        let record = NewAccessRecord {
            profile,
            kind: request.kind,
            outcome: decision.outcome,
            token: decision.via_token,
            user: request.viewer,
            meta: request.meta.clone(),
            status_code: Some(decision.status_code),
            response_size: None,
            cause: if decision.allowed {
                String::new()
            } else {
                decision.reason.as_str().to_string()
            },
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
        };

        if let Err(e) = self.store.append_record(&record).await {
            tracing::warn!(profile = %profile, error = %e, "failed to append access record");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Visibility Policy Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the policy for a profile, creating the default lazily.
    pub async fn visibility_for(&self, profile: ProfileId) -> Result<VisibilityPolicy> {
        self.get_or_create_policy(profile, now_millis()).await
    }

    /// Apply a partial update to a profile's policy.
    pub async fn update_visibility(
        &self,
        profile: ProfileId,
        update: PolicyUpdate,
    ) -> Result<VisibilityPolicy> {
        let now = now_millis();
        let mut policy = self.get_or_create_policy(profile, now).await?;
        update.apply(&mut policy, now);
        self.store.upsert_policy(&policy).await?;
        Ok(policy)
    }

    /// Add a user to a profile's blocklist.
    pub async fn block_user(&self, profile: ProfileId, user: UserId) -> Result<VisibilityPolicy> {
        let now = now_millis();
        let mut policy = self.get_or_create_policy(profile, now).await?;
        policy.block(user);
        policy.updated_at = now;
        self.store.upsert_policy(&policy).await?;
        Ok(policy)
    }

    /// Remove a user from a profile's blocklist.
    pub async fn unblock_user(&self, profile: ProfileId, user: UserId) -> Result<VisibilityPolicy> {
        let now = now_millis();
        let mut policy = self.get_or_create_policy(profile, now).await?;
        policy.unblock(user);
        policy.updated_at = now;
        self.store.upsert_policy(&policy).await?;
        Ok(policy)
    }

    async fn get_or_create_policy(
        &self,
        profile: ProfileId,
        now: i64,
    ) -> Result<VisibilityPolicy> {
        if let Some(policy) = self.store.get_policy(profile).await? {
            return Ok(policy);
        }

        let policy = VisibilityPolicy::new(profile, now);
        self.store.upsert_policy(&policy).await?;
        Ok(policy)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Share Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a share for `profile`.
    ///
    /// Refused when the profile's policy disables public sharing. When a
    /// token is bound it must belong to the same profile.
    pub async fn create_share(
        &self,
        profile: ProfileId,
        sharer: UserId,
        params: ShareParams,
        token: Option<TokenId>,
    ) -> Result<Share> {
        let now = now_millis();
        let policy = self.get_or_create_policy(profile, now).await?;

        if !policy.sharing.allow_public_sharing {
            return Err(GateError::Forbidden {
                reason: "sharing_disabled".to_string(),
            });
        }

        if let Some(id) = token {
            let bound = self.get_token(id).await?;
            if bound.profile != profile {
                return Err(GateError::Validation(format!(
                    "token {id} is bound to a different profile"
                )));
            }
        }

        let expires_at = match params.expires_in_days {
            Some(days) if days <= 0 => {
                return Err(GateError::Validation(format!(
                    "share lifetime must be positive, got {days} days"
                )));
            }
            Some(days) => {
                let days = days.min(i64::from(policy.sharing.max_share_duration_days));
                Some(now + days * MILLIS_PER_DAY)
            }
            None => None,
        };

        let mut share = Share {
            id: ShareId(0),
            profile,
            shared_by: sharer,
            channel: params.channel,
            status: ShareStatus::Active,
            title: params.title,
            description: params.description,
            share_url: params.share_url,
            token,
            password: params.password,
            expires_at,
            max_clicks: params.max_clicks,
            click_count: 0,
            allowed_emails: params.allowed_emails,
            allowed_domains: params.allowed_domains,
            engagement: Default::default(),
            metadata: params.metadata,
            created_at: now,
            updated_at: now,
        };

        share.id = self.store.insert_share(&share).await?;
        tracing::debug!(share = %share.id, profile = %profile, "created share");
        Ok(share)
    }

    /// Get a share by id.
    pub async fn get_share(&self, id: ShareId) -> Result<Share> {
        self.store
            .get_share(id)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("share {id}")))
    }

    /// List shares created by a user, most recent first.
    pub async fn list_shares(&self, user: UserId) -> Result<Vec<Share>> {
        Ok(self.store.list_shares_by_user(user).await?)
    }

    /// Revoke a share. Only the sharer may do this. Cascades to the bound
    /// token, if any.
    pub async fn revoke_share(&self, id: ShareId, caller: UserId) -> Result<()> {
        let mut share = self.get_share(id).await?;
        if share.shared_by != caller {
            return Err(GateError::Forbidden {
                reason: "not_share_creator".to_string(),
            });
        }

        share.revoke();
        share.updated_at = now_millis();
        self.store.update_share(&share).await?;

        if let Some(token) = share.token {
            self.store.revoke_token(token).await?;
            tracing::debug!(share = %id, token = %token, "share revocation cascaded to token");
        }

        Ok(())
    }

    /// Record a click on a share link.
    ///
    /// Returns whether the share was active (and the click counted).
    pub async fn record_share_click(&self, id: ShareId) -> Result<bool> {
        let share = self.get_share(id).await?;
        if !share.is_active(now_millis()) {
            return Ok(false);
        }

        self.store.record_share_click(id).await?;
        Ok(true)
    }

    /// Record a profile view originating from a share.
    pub async fn record_share_view(&self, id: ShareId) -> Result<()> {
        // Existence check keeps counter updates from silently no-opping.
        self.get_share(id).await?;
        Ok(self.store.record_share_view(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Analytics
    // ─────────────────────────────────────────────────────────────────────────

    /// Aggregate access analytics for a profile over the recent window.
    pub async fn analytics_for(&self, profile: ProfileId) -> Result<ProfileAnalytics> {
        let records = self
            .store
            .recent_records(profile, self.config.analytics_window)
            .await?;

        Ok(analytics::compute(
            &records,
            self.config.recent_activity_limit,
            self.config.agent_max_chars,
        ))
    }
}

/// The capability an access kind requires on the token path.
fn required_capability(kind: AccessKind) -> Capability {
    match kind {
        AccessKind::View => Capability::View,
        AccessKind::Edit => Capability::Edit,
        AccessKind::Share => Capability::Share,
        AccessKind::Download => Capability::Download,
        // API access is view-shaped; finer scoping rides on the token kind.
        AccessKind::Api => Capability::View,
    }
}
