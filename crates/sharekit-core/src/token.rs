//! Share tokens: opaque bearer credentials scoped to one profile.
//!
//! A token grants time-boxed, usage-capped, capability-scoped access to a
//! single profile. Validity is evaluated lazily at validation time; there
//! is no background sweep.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{ProfileId, TokenId, TokenSecret, UserId, MILLIS_PER_DAY};

/// Number of random bytes in a token secret (256 bits before encoding).
const SECRET_BYTES: usize = 32;

/// Default token lifetime when the issuer does not specify one.
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// The fixed enumeration of token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// View-only access.
    View,
    /// Edit access.
    Edit,
    /// Share permission.
    Share,
    /// API access.
    Api,
}

impl TokenKind {
    /// Parse a kind from its wire name.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "share" => Ok(Self::Share),
            "api" => Ok(Self::Api),
            other => Err(CoreError::InvalidKind(other.to_string())),
        }
    }

    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Share => "share",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named permission a token may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    Edit,
    Share,
    Download,
}

/// The capability flags carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_share: bool,
    pub can_download: bool,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::view_only()
    }
}

impl CapabilitySet {
    /// The default set: view only.
    pub const fn view_only() -> Self {
        Self {
            can_view: true,
            can_edit: false,
            can_share: false,
            can_download: false,
        }
    }

    /// Every capability enabled.
    pub const fn all() -> Self {
        Self {
            can_view: true,
            can_edit: true,
            can_share: true,
            can_download: true,
        }
    }

    /// Check whether a single capability is enabled.
    pub fn grants(&self, cap: Capability) -> bool {
        match cap {
            Capability::View => self.can_view,
            Capability::Edit => self.can_edit,
            Capability::Share => self.can_share,
            Capability::Download => self.can_download,
        }
    }

    /// Check whether every required capability is enabled.
    pub fn grants_all(&self, required: &[Capability]) -> bool {
        required.iter().all(|cap| self.grants(*cap))
    }
}

/// A share token row.
///
/// Revocation is permanent (`active` never goes back to true) and tokens
/// are never physically deleted while access records reference them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareToken {
    /// Row identifier, assigned by the store.
    pub id: TokenId,

    /// The profile this token is bound to.
    pub profile: ProfileId,

    /// The opaque secret, unique across all tokens.
    pub secret: TokenSecret,

    /// What kind of token this is.
    pub kind: TokenKind,

    /// Who created the token. Only the creator may mutate it.
    pub created_by: UserId,

    /// Absolute expiry (Unix ms), checked at validation time.
    pub expires_at: i64,

    /// False once revoked. Revocation is permanent.
    pub active: bool,

    /// Capability flags.
    pub capabilities: CapabilitySet,

    /// Usage cap. `None` means unlimited.
    pub max_views: Option<u32>,

    /// Count of successful accesses via this token.
    pub view_count: u32,

    /// Referer-host allowlist. Empty means unrestricted.
    pub allowed_domains: Vec<String>,

    /// Short human label for the token.
    pub purpose: String,

    /// Longer free-text description.
    pub description: String,

    /// Arbitrary structured metadata.
    pub metadata: serde_json::Value,

    /// When the token was last used successfully (Unix ms).
    pub last_used_at: Option<i64>,

    /// Origin address of the last successful use.
    pub last_used_address: Option<String>,

    /// When the token was created (Unix ms).
    pub created_at: i64,
}

impl ShareToken {
    /// Generate a fresh secret: 32 random bytes, hex-encoded.
    ///
    /// 64 lowercase hex characters, URL-safe, 256 bits of entropy.
    pub fn generate_secret() -> TokenSecret {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        TokenSecret::new(hex::encode(bytes))
    }

    /// Check whether the token currently validates.
    ///
    /// True iff the token is active, unexpired at `now`, and under its
    /// usage cap. Pure function of current state; no side effects.
    pub fn is_valid(&self, now: i64) -> bool {
        if !self.active {
            return false;
        }

        if now > self.expires_at {
            return false;
        }

        if let Some(max) = self.max_views {
            if self.view_count >= max {
                return false;
            }
        }

        true
    }

    /// Check whether the token grants every required capability.
    pub fn has_capabilities(&self, required: &[Capability]) -> bool {
        self.capabilities.grants_all(required)
    }

    /// Revoke the token. Idempotent; there is no un-revoke.
    pub fn revoke(&mut self) {
        self.active = false;
    }

    /// Extend the expiry to `now + days`.
    ///
    /// This replaces the existing expiry rather than adding to it, so an
    /// already-expired token becomes valid again for `days` days.
    pub fn extend(&mut self, now: i64, days: i64) {
        self.expires_at = now + days * MILLIS_PER_DAY;
    }

    /// Record a successful use at `now`.
    ///
    /// Callers must consult `is_valid` first and call this at most once
    /// per successful access, so `view_count` stays "count of successful
    /// accesses". Persistent stores enforce the cap atomically instead of
    /// going through this method.
    pub fn record_use(&mut self, now: i64, origin_address: Option<&str>) {
        self.view_count += 1;
        self.last_used_at = Some(now);
        if let Some(addr) = origin_address {
            self.last_used_address = Some(addr.to_string());
        }
    }
}

/// Parameters for issuing a new token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueParams {
    pub kind: TokenKind,
    pub purpose: String,
    pub description: String,
    pub capabilities: CapabilitySet,
    /// Lifetime in days; defaults to [`DEFAULT_TTL_DAYS`] when `None`.
    pub ttl_days: Option<i64>,
    pub max_views: Option<u32>,
    pub allowed_domains: Vec<String>,
    pub metadata: serde_json::Value,
}

impl IssueParams {
    /// Minimal issuance parameters: a view-only token with defaults.
    pub fn new(kind: TokenKind, purpose: impl Into<String>) -> Self {
        Self {
            kind,
            purpose: purpose.into(),
            description: String::new(),
            capabilities: CapabilitySet::view_only(),
            ttl_days: None,
            max_views: None,
            allowed_domains: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Set the capability flags.
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the lifetime in days.
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_days = Some(days);
        self
    }

    /// Set the usage cap.
    pub fn with_max_views(mut self, max: u32) -> Self {
        self.max_views = Some(max);
        self
    }

    /// Set the referer-host allowlist.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }
}

/// The fixed set of fields a creator may update on an existing token.
///
/// Fields left as `None` are not touched. `extend_days` resets the expiry
/// from now.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub purpose: Option<String>,
    pub description: Option<String>,
    pub can_view: Option<bool>,
    pub can_edit: Option<bool>,
    pub can_share: Option<bool>,
    pub can_download: Option<bool>,
    pub max_views: Option<Option<u32>>,
    pub extend_days: Option<i64>,
}

impl TokenUpdate {
    /// Apply this update to a token at time `now`.
    pub fn apply(&self, token: &mut ShareToken, now: i64) {
        if let Some(ref purpose) = self.purpose {
            token.purpose = purpose.clone();
        }
        if let Some(ref description) = self.description {
            token.description = description.clone();
        }
        if let Some(v) = self.can_view {
            token.capabilities.can_view = v;
        }
        if let Some(v) = self.can_edit {
            token.capabilities.can_edit = v;
        }
        if let Some(v) = self.can_share {
            token.capabilities.can_share = v;
        }
        if let Some(v) = self.can_download {
            token.capabilities.can_download = v;
        }
        if let Some(max) = self.max_views {
            token.max_views = max;
        }
        if let Some(days) = self.extend_days {
            token.extend(now, days);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(expires_at: i64) -> ShareToken {
        ShareToken {
            id: TokenId(1),
            profile: ProfileId(1),
            secret: ShareToken::generate_secret(),
            kind: TokenKind::View,
            created_by: UserId(1),
            expires_at,
            active: true,
            capabilities: CapabilitySet::view_only(),
            max_views: None,
            view_count: 0,
            allowed_domains: Vec::new(),
            purpose: "test".to_string(),
            description: String::new(),
            metadata: serde_json::json!({}),
            last_used_at: None,
            last_used_address: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_secret_is_64_hex_chars() {
        let secret = ShareToken::generate_secret();
        assert_eq!(secret.as_str().len(), 64);
        assert!(secret.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_secrets_are_unique() {
        let a = ShareToken::generate_secret();
        let b = ShareToken::generate_secret();
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_valid_checks_expiry() {
        let token = make_token(1000);
        assert!(token.is_valid(500));
        assert!(token.is_valid(1000)); // At expiry
        assert!(!token.is_valid(1001)); // Past expiry
    }

    #[test]
    fn test_is_valid_checks_cap() {
        let mut token = make_token(i64::MAX);
        token.max_views = Some(2);
        assert!(token.is_valid(0));
        token.view_count = 1;
        assert!(token.is_valid(0));
        token.view_count = 2;
        assert!(!token.is_valid(0));
    }

    #[test]
    fn test_revoke_is_permanent_and_idempotent() {
        let mut token = make_token(i64::MAX);
        token.revoke();
        assert!(!token.is_valid(0));
        token.revoke();
        assert!(!token.is_valid(0));
    }

    #[test]
    fn test_extend_resets_from_now() {
        let mut token = make_token(1000);
        assert!(!token.is_valid(5000)); // Expired
        token.extend(5000, 7);
        assert_eq!(token.expires_at, 5000 + 7 * MILLIS_PER_DAY);
        assert!(token.is_valid(5000)); // Extension un-expires
    }

    #[test]
    fn test_capability_mapping() {
        let mut token = make_token(i64::MAX);
        assert!(token.has_capabilities(&[Capability::View]));
        assert!(!token.has_capabilities(&[Capability::View, Capability::Edit]));

        token.capabilities = CapabilitySet::all();
        assert!(token.has_capabilities(&[
            Capability::View,
            Capability::Edit,
            Capability::Share,
            Capability::Download,
        ]));
    }

    #[test]
    fn test_record_use_updates_counters() {
        let mut token = make_token(i64::MAX);
        token.record_use(42, Some("203.0.113.7"));
        assert_eq!(token.view_count, 1);
        assert_eq!(token.last_used_at, Some(42));
        assert_eq!(token.last_used_address.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_kind_parse_rejects_unknown() {
        assert!(TokenKind::parse("view").is_ok());
        assert!(matches!(
            TokenKind::parse("root"),
            Err(CoreError::InvalidKind(_))
        ));
    }

    #[test]
    fn test_update_applies_only_named_fields() {
        let mut token = make_token(1000);
        let update = TokenUpdate {
            purpose: Some("updated".to_string()),
            can_edit: Some(true),
            ..Default::default()
        };
        update.apply(&mut token, 500);
        assert_eq!(token.purpose, "updated");
        assert!(token.capabilities.can_edit);
        assert!(token.capabilities.can_view); // Untouched
        assert_eq!(token.expires_at, 1000); // No extend requested
    }
}
