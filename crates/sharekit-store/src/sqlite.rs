//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for sharekit. It uses rusqlite
//! with bundled SQLite. The usage-cap accounting is a single conditional
//! UPDATE, which is the one transactional guarantee this system needs:
//! two concurrent uses of a token with one view left cannot both pass.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use sharekit_core::{
    AccessKind, AccessOutcome, AccessRecord, CapabilitySet, NewAccessRecord, ProfileId,
    RequestMeta, Share, ShareChannel, ShareEngagement, ShareId, ShareStatus, ShareToken, TokenId,
    TokenKind, UserId, VisibilityPolicy, VisibilityTier,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Store, TokenInsert};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. Write paths that contend on the
/// usage counter go through spawn_blocking to avoid stalling the
/// async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute an operation on the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| {
            StoreError::InvalidData(format!("connection mutex poisoned: {}", e))
        })?;
        f(&conn)
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::InvalidData(format!("connection mutex poisoned: {}", e))
}

/// True when the error is a UNIQUE constraint violation.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn decode_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn invalid(e: sharekit_core::CoreError) -> StoreError {
    StoreError::InvalidData(e.to_string())
}

// Helper to convert a row to ShareToken
fn row_to_token(row: &rusqlite::Row<'_>) -> Result<ShareToken> {
    let kind: String = row.get("kind")?;
    let allowed_domains: String = row.get("allowed_domains")?;
    let metadata: String = row.get("metadata")?;

    Ok(ShareToken {
        id: TokenId(row.get("token_id")?),
        profile: ProfileId(row.get("profile_id")?),
        secret: row.get::<_, String>("secret")?.into(),
        kind: TokenKind::parse(&kind).map_err(invalid)?,
        created_by: UserId(row.get("created_by")?),
        expires_at: row.get("expires_at")?,
        active: row.get("active")?,
        capabilities: CapabilitySet {
            can_view: row.get("can_view")?,
            can_edit: row.get("can_edit")?,
            can_share: row.get("can_share")?,
            can_download: row.get("can_download")?,
        },
        max_views: row.get("max_views")?,
        view_count: row.get("view_count")?,
        allowed_domains: decode_json(&allowed_domains)?,
        purpose: row.get("purpose")?,
        description: row.get("description")?,
        metadata: decode_json(&metadata)?,
        last_used_at: row.get("last_used_at")?,
        last_used_address: row.get("last_used_address")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_policy(row: &rusqlite::Row<'_>) -> Result<VisibilityPolicy> {
    let tier: String = row.get("tier")?;
    let search_tier: String = row.get("search_tier")?;
    let blocked: String = row.get("blocked_users")?;
    let custom_rules: String = row.get("custom_rules")?;

    Ok(VisibilityPolicy {
        profile: ProfileId(row.get("profile_id")?),
        tier: VisibilityTier::parse(&tier).map_err(invalid)?,
        sections: sharekit_core::SectionVisibility {
            show_contact_info: row.get("show_contact_info")?,
            show_experience: row.get("show_experience")?,
            show_education: row.get("show_education")?,
            show_skills: row.get("show_skills")?,
            show_connections: row.get("show_connections")?,
            show_activity: row.get("show_activity")?,
        },
        appear_in_search: row.get("appear_in_search")?,
        search_tier: VisibilityTier::parse(&search_tier).map_err(invalid)?,
        sharing: sharekit_core::SharingSettings {
            allow_public_sharing: row.get("allow_public_sharing")?,
            require_approval_for_sharing: row.get("require_approval_for_sharing")?,
            auto_approve_connections: row.get("auto_approve_connections")?,
            max_share_duration_days: row.get("max_share_duration_days")?,
            require_2fa_for_sensitive: row.get("require_2fa_for_sensitive")?,
        },
        audience: sharekit_core::AudienceSettings {
            visible_to_alumni: row.get("visible_to_alumni")?,
            visible_to_colleagues: row.get("visible_to_colleagues")?,
            visible_to_group_members: row.get("visible_to_group_members")?,
        },
        blocked_users: decode_json(&blocked)?,
        custom_rules: decode_json(&custom_rules)?,
        track_views: row.get("track_views")?,
        show_view_count: row.get("show_view_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<AccessRecord> {
    let kind: String = row.get("kind")?;
    let outcome: String = row.get("outcome")?;
    let metadata: String = row.get("metadata")?;

    Ok(AccessRecord {
        id: row.get("record_id")?,
        profile: ProfileId(row.get("profile_id")?),
        kind: AccessKind::parse(&kind).map_err(invalid)?,
        outcome: AccessOutcome::parse(&outcome).map_err(invalid)?,
        token: row.get::<_, Option<i64>>("token_id")?.map(TokenId),
        user: row.get::<_, Option<i64>>("user_id")?.map(UserId),
        meta: RequestMeta {
            origin_address: row.get("origin_address")?,
            origin_agent: row.get("origin_agent")?,
            referer: row.get("referer")?,
            endpoint: row.get("endpoint")?,
            method: row.get("method")?,
        },
        status_code: row.get("status_code")?,
        response_size: row.get("response_size")?,
        cause: row.get("cause")?,
        metadata: decode_json(&metadata)?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_share(row: &rusqlite::Row<'_>) -> Result<Share> {
    let channel: String = row.get("channel")?;
    let status: String = row.get("status")?;
    let allowed_emails: String = row.get("allowed_emails")?;
    let allowed_domains: String = row.get("allowed_domains")?;
    let metadata: String = row.get("metadata")?;

    Ok(Share {
        id: ShareId(row.get("share_id")?),
        profile: ProfileId(row.get("profile_id")?),
        shared_by: UserId(row.get("shared_by")?),
        channel: ShareChannel::parse(&channel).map_err(invalid)?,
        status: ShareStatus::parse(&status).map_err(invalid)?,
        title: row.get("title")?,
        description: row.get("description")?,
        share_url: row.get("share_url")?,
        token: row.get::<_, Option<i64>>("token_id")?.map(TokenId),
        password: row.get("password")?,
        expires_at: row.get("expires_at")?,
        max_clicks: row.get("max_clicks")?,
        click_count: row.get("click_count")?,
        allowed_emails: decode_json(&allowed_emails)?,
        allowed_domains: decode_json(&allowed_domains)?,
        engagement: ShareEngagement {
            views: row.get("views")?,
            unique_views: row.get("unique_views")?,
            reshares: row.get("reshares")?,
            downloads: row.get("downloads")?,
        },
        metadata: decode_json(&metadata)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const TOKEN_COLUMNS: &str = "token_id, profile_id, secret, kind, created_by, expires_at, active, \
     can_view, can_edit, can_share, can_download, max_views, view_count, allowed_domains, \
     purpose, description, metadata, last_used_at, last_used_address, created_at";

const RECORD_COLUMNS: &str = "record_id, profile_id, kind, outcome, token_id, user_id, \
     origin_address, origin_agent, referer, endpoint, method, status_code, response_size, \
     cause, metadata, created_at";

const SHARE_COLUMNS: &str = "share_id, profile_id, shared_by, channel, status, title, \
     description, share_url, token_id, password, expires_at, max_clicks, click_count, \
     allowed_emails, allowed_domains, views, unique_views, reshares, downloads, metadata, \
     created_at, updated_at";

#[async_trait]
impl Store for SqliteStore {
    async fn insert_token(&self, token: &ShareToken) -> Result<TokenInsert> {
        let token = token.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_err)?;

            let result = conn.execute(
                "INSERT INTO share_tokens
                    (profile_id, secret, kind, created_by, expires_at, active,
                     can_view, can_edit, can_share, can_download, max_views, view_count,
                     allowed_domains, purpose, description, metadata,
                     last_used_at, last_used_address, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    token.profile.0,
                    token.secret.as_str(),
                    token.kind.as_str(),
                    token.created_by.0,
                    token.expires_at,
                    token.active,
                    token.capabilities.can_view,
                    token.capabilities.can_edit,
                    token.capabilities.can_share,
                    token.capabilities.can_download,
                    token.max_views,
                    token.view_count,
                    serde_json::to_string(&token.allowed_domains)?,
                    token.purpose,
                    token.description,
                    serde_json::to_string(&token.metadata)?,
                    token.last_used_at,
                    token.last_used_address,
                    token.created_at,
                ],
            );

            match result {
                Ok(_) => Ok(TokenInsert::Inserted(TokenId(conn.last_insert_rowid()))),
                Err(e) if is_unique_violation(&e) => Ok(TokenInsert::DuplicateSecret),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }

    async fn get_token(&self, id: TokenId) -> Result<Option<ShareToken>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {TOKEN_COLUMNS} FROM share_tokens WHERE token_id = ?1"),
                    params![id.0],
                    |row| Ok(row_to_token(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    async fn get_token_by_secret(&self, secret: &str) -> Result<Option<ShareToken>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {TOKEN_COLUMNS} FROM share_tokens WHERE secret = ?1"),
                    params![secret],
                    |row| Ok(row_to_token(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    async fn list_tokens_by_creator(&self, creator: UserId) -> Result<Vec<ShareToken>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOKEN_COLUMNS} FROM share_tokens
                 WHERE created_by = ?1 AND active = 1
                 ORDER BY created_at DESC, token_id DESC"
            ))?;

            let rows = stmt.query_map(params![creator.0], |row| Ok(row_to_token(row)))?;
            let mut tokens = Vec::new();
            for row in rows {
                tokens.push(row??);
            }
            Ok(tokens)
        })
    }

    async fn update_token(&self, token: &ShareToken) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE share_tokens SET
                    expires_at = ?2, active = ?3,
                    can_view = ?4, can_edit = ?5, can_share = ?6, can_download = ?7,
                    max_views = ?8, allowed_domains = ?9, purpose = ?10,
                    description = ?11, metadata = ?12
                 WHERE token_id = ?1",
                params![
                    token.id.0,
                    token.expires_at,
                    token.active,
                    token.capabilities.can_view,
                    token.capabilities.can_edit,
                    token.capabilities.can_share,
                    token.capabilities.can_download,
                    token.max_views,
                    serde_json::to_string(&token.allowed_domains)?,
                    token.purpose,
                    token.description,
                    serde_json::to_string(&token.metadata)?,
                ],
            )?;
            Ok(())
        })
    }

    async fn revoke_token(&self, id: TokenId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE share_tokens SET active = 0 WHERE token_id = ?1",
                params![id.0],
            )?;
            Ok(())
        })
    }

    async fn record_token_use(
        &self,
        id: TokenId,
        now: i64,
        origin_address: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.clone();
        let origin_address = origin_address.map(String::from);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_err)?;

            // Conditional increment: the cap check and the counter bump are
            // one statement, so concurrent requests serialize here.
            let changed = conn.execute(
                "UPDATE share_tokens SET
                    view_count = view_count + 1,
                    last_used_at = ?2,
                    last_used_address = COALESCE(?3, last_used_address)
                 WHERE token_id = ?1
                   AND (max_views IS NULL OR view_count < max_views)",
                params![id.0, now, origin_address],
            )?;

            Ok(changed == 1)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }

    async fn get_policy(&self, profile: ProfileId) -> Result<Option<VisibilityPolicy>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM visibility_policies WHERE profile_id = ?1",
                    params![profile.0],
                    |row| Ok(row_to_policy(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    async fn upsert_policy(&self, policy: &VisibilityPolicy) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO visibility_policies
                    (profile_id, tier,
                     show_contact_info, show_experience, show_education,
                     show_skills, show_connections, show_activity,
                     appear_in_search, search_tier,
                     allow_public_sharing, require_approval_for_sharing, auto_approve_connections,
                     visible_to_alumni, visible_to_colleagues, visible_to_group_members,
                     blocked_users, custom_rules,
                     max_share_duration_days, require_2fa_for_sensitive,
                     track_views, show_view_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                         ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                params![
                    policy.profile.0,
                    policy.tier.as_str(),
                    policy.sections.show_contact_info,
                    policy.sections.show_experience,
                    policy.sections.show_education,
                    policy.sections.show_skills,
                    policy.sections.show_connections,
                    policy.sections.show_activity,
                    policy.appear_in_search,
                    policy.search_tier.as_str(),
                    policy.sharing.allow_public_sharing,
                    policy.sharing.require_approval_for_sharing,
                    policy.sharing.auto_approve_connections,
                    policy.audience.visible_to_alumni,
                    policy.audience.visible_to_colleagues,
                    policy.audience.visible_to_group_members,
                    serde_json::to_string(&policy.blocked_users)?,
                    serde_json::to_string(&policy.custom_rules)?,
                    policy.sharing.max_share_duration_days,
                    policy.sharing.require_2fa_for_sensitive,
                    policy.track_views,
                    policy.show_view_count,
                    policy.created_at,
                    policy.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn delete_policy(&self, profile: ProfileId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM visibility_policies WHERE profile_id = ?1",
                params![profile.0],
            )?;
            Ok(())
        })
    }

    async fn append_record(&self, record: &NewAccessRecord) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO access_records
                    (profile_id, kind, outcome, token_id, user_id,
                     origin_address, origin_agent, referer, endpoint, method,
                     status_code, response_size, cause, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record.profile.0,
                    record.kind.as_str(),
                    record.outcome.as_str(),
                    record.token.map(|t| t.0),
                    record.user.map(|u| u.0),
                    record.meta.origin_address,
                    record.meta.origin_agent,
                    record.meta.referer,
                    record.meta.endpoint,
                    record.meta.method,
                    record.status_code,
                    record.response_size,
                    record.cause,
                    serde_json::to_string(&record.metadata)?,
                    record.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    async fn recent_records(&self, profile: ProfileId, limit: usize) -> Result<Vec<AccessRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM access_records
                 WHERE profile_id = ?1
                 ORDER BY created_at DESC, record_id DESC
                 LIMIT ?2"
            ))?;

            let rows = stmt.query_map(params![profile.0, limit as i64], |row| {
                Ok(row_to_record(row))
            })?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row??);
            }
            Ok(records)
        })
    }

    async fn insert_share(&self, share: &Share) -> Result<ShareId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO shares
                    (profile_id, shared_by, channel, status, title, description, share_url,
                     token_id, password, expires_at, max_clicks, click_count,
                     allowed_emails, allowed_domains, views, unique_views, reshares, downloads,
                     metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                         ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    share.profile.0,
                    share.shared_by.0,
                    share.channel.as_str(),
                    share.status.as_str(),
                    share.title,
                    share.description,
                    share.share_url,
                    share.token.map(|t| t.0),
                    share.password,
                    share.expires_at,
                    share.max_clicks,
                    share.click_count,
                    serde_json::to_string(&share.allowed_emails)?,
                    serde_json::to_string(&share.allowed_domains)?,
                    share.engagement.views,
                    share.engagement.unique_views,
                    share.engagement.reshares,
                    share.engagement.downloads,
                    serde_json::to_string(&share.metadata)?,
                    share.created_at,
                    share.updated_at,
                ],
            )?;
            Ok(ShareId(conn.last_insert_rowid()))
        })
    }

    async fn get_share(&self, id: ShareId) -> Result<Option<Share>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {SHARE_COLUMNS} FROM shares WHERE share_id = ?1"),
                    params![id.0],
                    |row| Ok(row_to_share(row)),
                )
                .optional()?;
            row.transpose()
        })
    }

    async fn list_shares_by_user(&self, user: UserId) -> Result<Vec<Share>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SHARE_COLUMNS} FROM shares
                 WHERE shared_by = ?1
                 ORDER BY created_at DESC, share_id DESC"
            ))?;

            let rows = stmt.query_map(params![user.0], |row| Ok(row_to_share(row)))?;
            let mut shares = Vec::new();
            for row in rows {
                shares.push(row??);
            }
            Ok(shares)
        })
    }

    async fn update_share(&self, share: &Share) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE shares SET
                    status = ?2, title = ?3, description = ?4, share_url = ?5,
                    token_id = ?6, password = ?7, expires_at = ?8, max_clicks = ?9,
                    click_count = ?10, allowed_emails = ?11, allowed_domains = ?12,
                    views = ?13, unique_views = ?14, reshares = ?15, downloads = ?16,
                    metadata = ?17, updated_at = ?18
                 WHERE share_id = ?1",
                params![
                    share.id.0,
                    share.status.as_str(),
                    share.title,
                    share.description,
                    share.share_url,
                    share.token.map(|t| t.0),
                    share.password,
                    share.expires_at,
                    share.max_clicks,
                    share.click_count,
                    serde_json::to_string(&share.allowed_emails)?,
                    serde_json::to_string(&share.allowed_domains)?,
                    share.engagement.views,
                    share.engagement.unique_views,
                    share.engagement.reshares,
                    share.engagement.downloads,
                    serde_json::to_string(&share.metadata)?,
                    share.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn record_share_click(&self, id: ShareId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE shares SET click_count = click_count + 1 WHERE share_id = ?1",
                params![id.0],
            )?;
            Ok(())
        })
    }

    async fn record_share_view(&self, id: ShareId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE shares SET views = views + 1 WHERE share_id = ?1",
                params![id.0],
            )?;
            Ok(())
        })
    }
}
