//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. The cap check in
//! `record_token_use` happens under a single write lock, which gives it
//! the same linearizability as the SQLite conditional update.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sharekit_core::{
    AccessRecord, NewAccessRecord, ProfileId, Share, ShareId, ShareToken, TokenId, UserId,
    VisibilityPolicy,
};

use crate::error::Result;
use crate::traits::{Store, TokenInsert};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Tokens indexed by id.
    tokens: HashMap<TokenId, ShareToken>,

    /// Secret index: secret string -> token id.
    secrets: HashMap<String, TokenId>,

    /// Policies, one per profile.
    policies: HashMap<ProfileId, VisibilityPolicy>,

    /// Append-only access records, in insertion order.
    records: Vec<AccessRecord>,

    /// Shares indexed by id.
    shares: HashMap<ShareId, Share>,

    next_token_id: i64,
    next_record_id: i64,
    next_share_id: i64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                tokens: HashMap::new(),
                secrets: HashMap::new(),
                policies: HashMap::new(),
                records: Vec::new(),
                shares: HashMap::new(),
                next_token_id: 1,
                next_record_id: 1,
                next_share_id: 1,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_token(&self, token: &ShareToken) -> Result<TokenInsert> {
        let mut inner = self.inner.write().unwrap();

        if inner.secrets.contains_key(token.secret.as_str()) {
            return Ok(TokenInsert::DuplicateSecret);
        }

        let id = TokenId(inner.next_token_id);
        inner.next_token_id += 1;

        let mut stored = token.clone();
        stored.id = id;
        inner.secrets.insert(stored.secret.as_str().to_string(), id);
        inner.tokens.insert(id, stored);

        Ok(TokenInsert::Inserted(id))
    }

    async fn get_token(&self, id: TokenId) -> Result<Option<ShareToken>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.tokens.get(&id).cloned())
    }

    async fn get_token_by_secret(&self, secret: &str) -> Result<Option<ShareToken>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .secrets
            .get(secret)
            .and_then(|id| inner.tokens.get(id))
            .cloned())
    }

    async fn list_tokens_by_creator(&self, creator: UserId) -> Result<Vec<ShareToken>> {
        let inner = self.inner.read().unwrap();

        let mut tokens: Vec<ShareToken> = inner
            .tokens
            .values()
            .filter(|t| t.created_by == creator && t.active)
            .cloned()
            .collect();

        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(tokens)
    }

    async fn update_token(&self, token: &ShareToken) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn revoke_token(&self, id: TokenId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(token) = inner.tokens.get_mut(&id) {
            token.active = false;
        }
        Ok(())
    }

    async fn record_token_use(
        &self,
        id: TokenId,
        now: i64,
        origin_address: Option<&str>,
    ) -> Result<bool> {
        // Check and increment under one write lock: concurrent uses of a
        // token with one view left cannot both be admitted.
        let mut inner = self.inner.write().unwrap();

        let Some(token) = inner.tokens.get_mut(&id) else {
            return Ok(false);
        };

        if let Some(max) = token.max_views {
            if token.view_count >= max {
                return Ok(false);
            }
        }

        token.record_use(now, origin_address);
        Ok(true)
    }

    async fn get_policy(&self, profile: ProfileId) -> Result<Option<VisibilityPolicy>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.policies.get(&profile).cloned())
    }

    async fn upsert_policy(&self, policy: &VisibilityPolicy) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.policies.insert(policy.profile, policy.clone());
        Ok(())
    }

    async fn delete_policy(&self, profile: ProfileId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.policies.remove(&profile);
        Ok(())
    }

    async fn append_record(&self, record: &NewAccessRecord) -> Result<i64> {
        let mut inner = self.inner.write().unwrap();

        let id = inner.next_record_id;
        inner.next_record_id += 1;

        inner.records.push(AccessRecord {
            id,
            profile: record.profile,
            kind: record.kind,
            outcome: record.outcome,
            token: record.token,
            user: record.user,
            meta: record.meta.clone(),
            status_code: record.status_code,
            response_size: record.response_size,
            cause: record.cause.clone(),
            metadata: record.metadata.clone(),
            created_at: record.created_at,
        });

        Ok(id)
    }

    async fn recent_records(&self, profile: ProfileId, limit: usize) -> Result<Vec<AccessRecord>> {
        let inner = self.inner.read().unwrap();

        let mut records: Vec<AccessRecord> = inner
            .records
            .iter()
            .filter(|r| r.profile == profile)
            .cloned()
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(limit);
        Ok(records)
    }

    async fn insert_share(&self, share: &Share) -> Result<ShareId> {
        let mut inner = self.inner.write().unwrap();

        let id = ShareId(inner.next_share_id);
        inner.next_share_id += 1;

        let mut stored = share.clone();
        stored.id = id;
        inner.shares.insert(id, stored);

        Ok(id)
    }

    async fn get_share(&self, id: ShareId) -> Result<Option<Share>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.shares.get(&id).cloned())
    }

    async fn list_shares_by_user(&self, user: UserId) -> Result<Vec<Share>> {
        let inner = self.inner.read().unwrap();

        let mut shares: Vec<Share> = inner
            .shares
            .values()
            .filter(|s| s.shared_by == user)
            .cloned()
            .collect();

        shares.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(shares)
    }

    async fn update_share(&self, share: &Share) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn record_share_click(&self, id: ShareId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(share) = inner.shares.get_mut(&id) {
            share.click_count += 1;
        }
        Ok(())
    }

    async fn record_share_view(&self, id: ShareId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(share) = inner.shares.get_mut(&id) {
            share.engagement.views += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharekit_core::{CapabilitySet, TokenKind};

    fn make_token(secret: &str, max_views: Option<u32>) -> ShareToken {
        ShareToken {
            id: TokenId(0),
            profile: ProfileId(1),
            secret: secret.into(),
            kind: TokenKind::View,
            created_by: UserId(1),
            expires_at: i64::MAX,
            active: true,
            capabilities: CapabilitySet::view_only(),
            max_views,
            view_count: 0,
            allowed_domains: Vec::new(),
            purpose: "test".to_string(),
            description: String::new(),
            metadata: serde_json::json!({}),
            last_used_at: None,
            last_used_address: None,
            created_at: 1000,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_by_secret() {
        let store = MemoryStore::new();
        let result = store.insert_token(&make_token("abc", None)).await.unwrap();
        assert!(matches!(result, TokenInsert::Inserted(_)));

        let token = store.get_token_by_secret("abc").await.unwrap().unwrap();
        assert_eq!(token.profile, ProfileId(1));

        assert!(store.get_token_by_secret("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_secret_detected() {
        let store = MemoryStore::new();
        store.insert_token(&make_token("abc", None)).await.unwrap();

        let result = store.insert_token(&make_token("abc", None)).await.unwrap();
        assert_eq!(result, TokenInsert::DuplicateSecret);
    }

    #[tokio::test]
    async fn test_record_use_enforces_cap() {
        let store = MemoryStore::new();
        let TokenInsert::Inserted(id) =
            store.insert_token(&make_token("abc", Some(1))).await.unwrap()
        else {
            panic!("insert failed");
        };

        assert!(store.record_token_use(id, 10, Some("198.51.100.1")).await.unwrap());
        assert!(!store.record_token_use(id, 20, None).await.unwrap());

        let token = store.get_token(id).await.unwrap().unwrap();
        assert_eq!(token.view_count, 1);
        assert_eq!(token.last_used_at, Some(10));
        assert_eq!(token.last_used_address.as_deref(), Some("198.51.100.1"));
    }

    #[tokio::test]
    async fn test_concurrent_uses_never_exceed_cap() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let TokenInsert::Inserted(id) =
            store.insert_token(&make_token("abc", Some(5))).await.unwrap()
        else {
            panic!("insert failed");
        };

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.record_token_use(id, i, None).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 5);
        let token = store.get_token(id).await.unwrap().unwrap();
        assert_eq!(token.view_count, 5);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryStore::new();
        let TokenInsert::Inserted(id) =
            store.insert_token(&make_token("abc", None)).await.unwrap()
        else {
            panic!("insert failed");
        };

        store.revoke_token(id).await.unwrap();
        store.revoke_token(id).await.unwrap();

        let token = store.get_token(id).await.unwrap().unwrap();
        assert!(!token.active);
    }

    #[tokio::test]
    async fn test_list_by_creator_excludes_revoked() {
        let store = MemoryStore::new();
        let mut newer = make_token("abc", None);
        newer.created_at = 2000;
        store.insert_token(&newer).await.unwrap();

        let TokenInsert::Inserted(old_id) =
            store.insert_token(&make_token("def", None)).await.unwrap()
        else {
            panic!("insert failed");
        };

        let tokens = store.list_tokens_by_creator(UserId(1)).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].created_at, 2000); // Most recent first

        store.revoke_token(old_id).await.unwrap();
        let tokens = store.list_tokens_by_creator(UserId(1)).await.unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_token_revocation() {
        use sharekit_core::{AccessKind, AccessOutcome, NewAccessRecord, RequestMeta};

        let store = MemoryStore::new();
        let TokenInsert::Inserted(id) =
            store.insert_token(&make_token("abc", None)).await.unwrap()
        else {
            panic!("insert failed");
        };

        store
            .append_record(&NewAccessRecord {
                profile: ProfileId(1),
                kind: AccessKind::View,
                outcome: AccessOutcome::Success,
                token: Some(id),
                user: None,
                meta: RequestMeta::default(),
                status_code: Some(200),
                response_size: None,
                cause: String::new(),
                metadata: serde_json::json!({}),
                created_at: 100,
            })
            .await
            .unwrap();

        store.revoke_token(id).await.unwrap();

        let records = store.recent_records(ProfileId(1), 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token, Some(id));
    }

    #[tokio::test]
    async fn test_recent_records_ordering_and_limit() {
        use sharekit_core::{AccessKind, AccessOutcome, NewAccessRecord, RequestMeta};

        let store = MemoryStore::new();
        for t in 0..5 {
            store
                .append_record(&NewAccessRecord {
                    profile: ProfileId(1),
                    kind: AccessKind::View,
                    outcome: AccessOutcome::Success,
                    token: None,
                    user: None,
                    meta: RequestMeta::default(),
                    status_code: Some(200),
                    response_size: None,
                    cause: String::new(),
                    metadata: serde_json::json!({}),
                    created_at: t,
                })
                .await
                .unwrap();
        }

        let records = store.recent_records(ProfileId(1), 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].created_at, 4);
        assert_eq!(records[2].created_at, 2);
    }
}
