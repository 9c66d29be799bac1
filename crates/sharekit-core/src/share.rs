//! Shares: higher-level "this profile was shared via X channel" records.
//!
//! A share may bind a token; revoking the share cascades to the token.
//! Whether a share is active is always computed from its parts, never
//! cached as a stored boolean.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ProfileId, ShareId, TokenId, UserId};

/// The channel a profile was shared through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareChannel {
    Link,
    Email,
    Social,
    Embed,
    Api,
}

impl ShareChannel {
    /// Parse a channel from its wire name.
    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        match s {
            "link" => Ok(Self::Link),
            "email" => Ok(Self::Email),
            "social" => Ok(Self::Social),
            "embed" => Ok(Self::Embed),
            "api" => Ok(Self::Api),
            other => Err(crate::error::CoreError::Malformed(format!(
                "unknown share channel: {other}"
            ))),
        }
    }

    /// The wire name of this channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Email => "email",
            Self::Social => "social",
            Self::Embed => "embed",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for ShareChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Active,
    Paused,
    Expired,
    Revoked,
}

impl ShareStatus {
    /// Parse a status from its wire name.
    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(crate::error::CoreError::Malformed(format!(
                "unknown share status: {other}"
            ))),
        }
    }

    /// The wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

/// Engagement counters for a share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEngagement {
    pub views: u32,
    pub unique_views: u32,
    pub reshares: u32,
    pub downloads: u32,
}

/// A sharing instance for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Row identifier, assigned by the store.
    pub id: ShareId,

    pub profile: ProfileId,
    pub shared_by: UserId,
    pub channel: ShareChannel,
    pub status: ShareStatus,

    pub title: String,
    pub description: String,
    pub share_url: String,

    /// Optional bound token; revoking the share revokes it too.
    pub token: Option<TokenId>,

    /// Optional password gate. Empty means none.
    pub password: String,

    /// Optional absolute expiry (Unix ms).
    pub expires_at: Option<i64>,

    /// Optional click cap and its counter.
    pub max_clicks: Option<u32>,
    pub click_count: u32,

    /// Target allowlists. Empty means unrestricted.
    pub allowed_emails: Vec<String>,
    pub allowed_domains: Vec<String>,

    pub engagement: ShareEngagement,

    /// Arbitrary structured metadata.
    pub metadata: serde_json::Value,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Share {
    /// Whether the share is currently active.
    ///
    /// Computed: status must be `active`, expiry (if any) not passed, and
    /// click cap (if any) not exhausted.
    pub fn is_active(&self, now: i64) -> bool {
        if self.status != ShareStatus::Active {
            return false;
        }

        if let Some(expires) = self.expires_at {
            if now > expires {
                return false;
            }
        }

        if let Some(max) = self.max_clicks {
            if self.click_count >= max {
                return false;
            }
        }

        true
    }

    /// Record a click on the share.
    pub fn record_click(&mut self) {
        self.click_count += 1;
    }

    /// Record a profile view originating from the share.
    pub fn record_view(&mut self) {
        self.engagement.views += 1;
    }

    /// Revoke the share. The caller is responsible for cascading the
    /// revoke to the bound token.
    pub fn revoke(&mut self) {
        self.status = ShareStatus::Revoked;
    }
}

/// Parameters for creating a new share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareParams {
    pub channel: ShareChannel,
    pub title: String,
    pub description: String,
    pub share_url: String,
    pub password: String,
    pub expires_in_days: Option<i64>,
    pub max_clicks: Option<u32>,
    pub allowed_emails: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub metadata: serde_json::Value,
}

impl ShareParams {
    /// Minimal parameters: an unrestricted share.
    pub fn new(channel: ShareChannel, title: impl Into<String>) -> Self {
        Self {
            channel,
            title: title.into(),
            description: String::new(),
            share_url: String::new(),
            password: String::new(),
            expires_in_days: None,
            max_clicks: None,
            allowed_emails: Vec::new(),
            allowed_domains: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_share() -> Share {
        Share {
            id: ShareId(1),
            profile: ProfileId(1),
            shared_by: UserId(1),
            channel: ShareChannel::Link,
            status: ShareStatus::Active,
            title: "test".to_string(),
            description: String::new(),
            share_url: String::new(),
            token: None,
            password: String::new(),
            expires_at: None,
            max_clicks: None,
            click_count: 0,
            allowed_emails: Vec::new(),
            allowed_domains: Vec::new(),
            engagement: ShareEngagement::default(),
            metadata: serde_json::json!({}),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_active_share() {
        let share = make_share();
        assert!(share.is_active(0));
    }

    #[test]
    fn test_paused_share_is_inactive() {
        let mut share = make_share();
        share.status = ShareStatus::Paused;
        assert!(!share.is_active(0));
    }

    #[test]
    fn test_expired_share_is_inactive() {
        let mut share = make_share();
        share.expires_at = Some(100);
        assert!(share.is_active(100));
        assert!(!share.is_active(101));
    }

    #[test]
    fn test_click_cap() {
        let mut share = make_share();
        share.max_clicks = Some(2);
        assert!(share.is_active(0));
        share.record_click();
        share.record_click();
        assert!(!share.is_active(0));
    }

    #[test]
    fn test_revoke() {
        let mut share = make_share();
        share.revoke();
        assert_eq!(share.status, ShareStatus::Revoked);
        assert!(!share.is_active(0));
    }
}
