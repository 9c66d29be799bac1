//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL
//! string that transforms the schema from version N to N+1.

use rusqlite::Connection;
use sharekit_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;

            tracing::info!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Share tokens: capability-scoped bearer credentials
        CREATE TABLE share_tokens (
            token_id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            secret TEXT NOT NULL UNIQUE,      -- 64 hex chars, 256 bits
            kind TEXT NOT NULL,               -- view|edit|share|api
            created_by INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,      -- Unix ms, checked lazily
            active INTEGER NOT NULL DEFAULT 1,
            can_view INTEGER NOT NULL DEFAULT 1,
            can_edit INTEGER NOT NULL DEFAULT 0,
            can_share INTEGER NOT NULL DEFAULT 0,
            can_download INTEGER NOT NULL DEFAULT 0,
            max_views INTEGER,                -- NULL = unlimited
            view_count INTEGER NOT NULL DEFAULT 0,
            allowed_domains TEXT NOT NULL DEFAULT '[]',  -- JSON array
            purpose TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            metadata TEXT NOT NULL DEFAULT '{}',         -- JSON object
            last_used_at INTEGER,
            last_used_address TEXT,
            created_at INTEGER NOT NULL
        );

        -- Visibility policies: exactly one per profile
        CREATE TABLE visibility_policies (
            profile_id INTEGER PRIMARY KEY,
            tier TEXT NOT NULL DEFAULT 'connections',
            show_contact_info INTEGER NOT NULL DEFAULT 1,
            show_experience INTEGER NOT NULL DEFAULT 1,
            show_education INTEGER NOT NULL DEFAULT 1,
            show_skills INTEGER NOT NULL DEFAULT 1,
            show_connections INTEGER NOT NULL DEFAULT 1,
            show_activity INTEGER NOT NULL DEFAULT 1,
            appear_in_search INTEGER NOT NULL DEFAULT 1,
            search_tier TEXT NOT NULL DEFAULT 'connections',
            allow_public_sharing INTEGER NOT NULL DEFAULT 1,
            require_approval_for_sharing INTEGER NOT NULL DEFAULT 0,
            auto_approve_connections INTEGER NOT NULL DEFAULT 1,
            visible_to_alumni INTEGER NOT NULL DEFAULT 1,
            visible_to_colleagues INTEGER NOT NULL DEFAULT 1,
            visible_to_group_members INTEGER NOT NULL DEFAULT 1,
            blocked_users TEXT NOT NULL DEFAULT '[]',    -- JSON array of ids
            custom_rules TEXT NOT NULL DEFAULT '{}',     -- JSON object
            max_share_duration_days INTEGER NOT NULL DEFAULT 365,
            require_2fa_for_sensitive INTEGER NOT NULL DEFAULT 0,
            track_views INTEGER NOT NULL DEFAULT 1,
            show_view_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Access records: append-only audit trail.
        -- token_id is a weak reference on purpose: no FK, so token
        -- deletion can never cascade into the log.
        CREATE TABLE access_records (
            record_id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            kind TEXT NOT NULL,               -- view|edit|share|download|api
            outcome TEXT NOT NULL,            -- success|denied|expired|revoked|forbidden
            token_id INTEGER,
            user_id INTEGER,                  -- NULL = anonymous
            origin_address TEXT NOT NULL DEFAULT '',
            origin_agent TEXT NOT NULL DEFAULT '',
            referer TEXT NOT NULL DEFAULT '',
            endpoint TEXT NOT NULL DEFAULT '',
            method TEXT NOT NULL DEFAULT '',
            status_code INTEGER,
            response_size INTEGER,
            cause TEXT NOT NULL DEFAULT '',
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );

        -- Shares: per-channel sharing instances
        CREATE TABLE shares (
            share_id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            shared_by INTEGER NOT NULL,
            channel TEXT NOT NULL,            -- link|email|social|embed|api
            status TEXT NOT NULL DEFAULT 'active',
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            share_url TEXT NOT NULL DEFAULT '',
            token_id INTEGER,                 -- weak reference, nullable
            password TEXT NOT NULL DEFAULT '',
            expires_at INTEGER,
            max_clicks INTEGER,
            click_count INTEGER NOT NULL DEFAULT 0,
            allowed_emails TEXT NOT NULL DEFAULT '[]',
            allowed_domains TEXT NOT NULL DEFAULT '[]',
            views INTEGER NOT NULL DEFAULT 0,
            unique_views INTEGER NOT NULL DEFAULT 0,
            reshares INTEGER NOT NULL DEFAULT 0,
            downloads INTEGER NOT NULL DEFAULT 0,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_tokens_profile_active ON share_tokens(profile_id, active);
        CREATE INDEX idx_tokens_expires_active ON share_tokens(expires_at, active);
        CREATE INDEX idx_tokens_created_by ON share_tokens(created_by);
        CREATE INDEX idx_records_profile_created ON access_records(profile_id, created_at);
        CREATE INDEX idx_records_kind_outcome ON access_records(kind, outcome);
        CREATE INDEX idx_records_token ON access_records(token_id);
        CREATE INDEX idx_records_origin ON access_records(origin_address);
        CREATE INDEX idx_shares_profile_status ON shares(profile_id, status);
        CREATE INDEX idx_shares_shared_by ON shares(shared_by);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        // Verify tables exist
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"share_tokens".to_string()));
        assert!(tables.contains(&"visibility_policies".to_string()));
        assert!(tables.contains(&"access_records".to_string()));
        assert!(tables.contains(&"shares".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap(); // Should not error
        migrate(&mut conn).unwrap(); // Still should not error

        // Verify version is 1
        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_secret_uniqueness_enforced() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let insert = "INSERT INTO share_tokens
            (profile_id, secret, kind, created_by, expires_at, created_at)
            VALUES (1, 'dup', 'view', 1, 0, 0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
