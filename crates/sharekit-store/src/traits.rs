//! Store trait: the abstract interface for sharekit persistence.
//!
//! This trait allows the access gate to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use sharekit_core::{
    AccessRecord, NewAccessRecord, ProfileId, Share, ShareId, ShareToken, TokenId, UserId,
    VisibilityPolicy,
};

use crate::error::Result;

/// Result of inserting a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInsert {
    /// Token was inserted; the store assigned this row identifier.
    Inserted(TokenId),
    /// A token with the same secret already exists. The caller should
    /// regenerate the secret and retry.
    DuplicateSecret,
}

/// The Store trait: async interface for sharekit persistence.
///
/// # Design Notes
///
/// - **Unique secrets**: inserting a token whose secret collides returns
///   `DuplicateSecret` rather than an error, so issuance can retry with
///   a fresh secret.
/// - **Atomic use accounting**: `record_token_use` performs the cap
///   check and the increment as one serializable step. Two concurrent
///   uses of a token with one view left must not both be admitted.
/// - **Weak token linkage**: access records reference tokens by nullable
///   id only; revoking or deleting a token never touches its records.
/// - **Append-only audit**: records are inserted and read, never updated
///   or deleted by any store operation.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Token Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a token. The `id` on the input is ignored; the store
    /// assigns the row identifier.
    async fn insert_token(&self, token: &ShareToken) -> Result<TokenInsert>;

    /// Get a token by row identifier.
    async fn get_token(&self, id: TokenId) -> Result<Option<ShareToken>>;

    /// Exact-match lookup by secret.
    async fn get_token_by_secret(&self, secret: &str) -> Result<Option<ShareToken>>;

    /// List a creator's active tokens, most recent first.
    async fn list_tokens_by_creator(&self, creator: UserId) -> Result<Vec<ShareToken>>;

    /// Overwrite a token row (matched by `token.id`).
    async fn update_token(&self, token: &ShareToken) -> Result<()>;

    /// Set `active = false`. Idempotent; revocation is permanent.
    async fn revoke_token(&self, id: TokenId) -> Result<()>;

    /// Record one successful use: increment the view counter and stamp
    /// `last_used_at` / `last_used_address`, but only if the counter is
    /// still under the cap. Returns whether the use was admitted.
    ///
    /// This is the one operation requiring a transactional guarantee:
    /// the check and the increment are a single serializable step.
    async fn record_token_use(
        &self,
        id: TokenId,
        now: i64,
        origin_address: Option<&str>,
    ) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Visibility Policy Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the policy for a profile, if one has been created.
    async fn get_policy(&self, profile: ProfileId) -> Result<Option<VisibilityPolicy>>;

    /// Insert or replace the policy for a profile.
    async fn upsert_policy(&self, policy: &VisibilityPolicy) -> Result<()>;

    /// Delete the policy for a profile (profile-deletion cascade).
    async fn delete_policy(&self, profile: ProfileId) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Access Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append one access record. Pure insert; returns the assigned id.
    async fn append_record(&self, record: &NewAccessRecord) -> Result<i64>;

    /// The most recent records for a profile, creation-time descending,
    /// capped at `limit`.
    async fn recent_records(&self, profile: ProfileId, limit: usize) -> Result<Vec<AccessRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Share Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a share. The `id` on the input is ignored; the store
    /// assigns the row identifier.
    async fn insert_share(&self, share: &Share) -> Result<ShareId>;

    /// Get a share by row identifier.
    async fn get_share(&self, id: ShareId) -> Result<Option<Share>>;

    /// List shares created by a user, most recent first.
    async fn list_shares_by_user(&self, user: UserId) -> Result<Vec<Share>>;

    /// Overwrite a share row (matched by `share.id`).
    async fn update_share(&self, share: &Share) -> Result<()>;

    /// Increment the click counter.
    async fn record_share_click(&self, id: ShareId) -> Result<()>;

    /// Increment the view counter.
    async fn record_share_view(&self, id: ShareId) -> Result<()>;
}
