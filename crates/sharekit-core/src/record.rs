//! Access records: the append-only audit trail.
//!
//! Every access decision (allow or deny) produces exactly one record.
//! Records are immutable once created and survive the deletion or
//! revocation of the token they reference.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ProfileId, TokenId, UserId};

/// What kind of access was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    View,
    Edit,
    Share,
    Download,
    Api,
}

impl AccessKind {
    /// Parse a kind from its wire name.
    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "share" => Ok(Self::Share),
            "download" => Ok(Self::Download),
            "api" => Ok(Self::Api),
            other => Err(crate::error::CoreError::Malformed(format!(
                "unknown access kind: {other}"
            ))),
        }
    }

    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Share => "share",
            Self::Download => "download",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recorded outcome of an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    Success,
    Denied,
    Expired,
    Revoked,
    Forbidden,
}

impl AccessOutcome {
    /// Parse an outcome from its wire name.
    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        match s {
            "success" => Ok(Self::Success),
            "denied" => Ok(Self::Denied),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            "forbidden" => Ok(Self::Forbidden),
            other => Err(crate::error::CoreError::Malformed(format!(
                "unknown access outcome: {other}"
            ))),
        }
    }

    /// The wire name of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable cause of an access decision.
///
/// These strings are the contract callers and tests assert on; the
/// human-facing message is separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    // No-token path (visibility cascade).
    Owner,
    Blocked,
    Public,
    Connection,
    NotConnected,
    Network,
    NotInNetwork,
    Private,
    /// Custom tier, allow or deny; the outcome disambiguates.
    CustomRule,

    // Token path.
    TokenAuthorized,
    TokenInvalid,
    TokenProfileMismatch,
    TokenNoViewPermission,
    DomainNotAllowed,
}

impl AccessReason {
    /// The wire name of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Blocked => "blocked",
            Self::Public => "public",
            Self::Connection => "connection",
            Self::NotConnected => "not_connected",
            Self::Network => "network",
            Self::NotInNetwork => "not_in_network",
            Self::Private => "private",
            Self::CustomRule => "custom_rule",
            Self::TokenAuthorized => "token_authorized",
            Self::TokenInvalid => "token_invalid",
            Self::TokenProfileMismatch => "token_profile_mismatch",
            Self::TokenNoViewPermission => "token_no_view_permission",
            Self::DomainNotAllowed => "domain_not_allowed",
        }
    }

    /// Whether this reason can accompany an allowed access.
    ///
    /// `CustomRule` appears on both verdicts, so a `true` here does not
    /// by itself mean the access succeeded.
    pub fn allows(&self) -> bool {
        matches!(
            self,
            Self::Owner
                | Self::Public
                | Self::Connection
                | Self::Network
                | Self::CustomRule
                | Self::TokenAuthorized
        )
    }
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request metadata captured alongside each access decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Originating address of the request.
    pub origin_address: String,
    /// The client's agent string.
    pub origin_agent: String,
    /// Referring URL, if any.
    pub referer: String,
    /// The endpoint path that handled the request.
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
}

/// One access attempt and its outcome. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Row identifier, assigned by the store.
    pub id: i64,

    /// The profile that was targeted.
    pub profile: ProfileId,

    pub kind: AccessKind,
    pub outcome: AccessOutcome,

    /// Weak reference to the token used, if any. Revoking or deleting
    /// the token must not invalidate this record.
    pub token: Option<TokenId>,

    /// The acting identity; `None` for anonymous requests.
    pub user: Option<UserId>,

    pub meta: RequestMeta,

    /// HTTP status the decision mapped to (200 allow, 403 deny).
    pub status_code: Option<u16>,

    /// Size of the response body, when known.
    pub response_size: Option<u64>,

    /// Machine-readable cause, stored verbatim, empty on success.
    pub cause: String,

    /// Arbitrary structured metadata.
    pub metadata: serde_json::Value,

    /// When the record was created (Unix ms).
    pub created_at: i64,
}

/// A record as assembled by the coordinator, before the store assigns
/// its row identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccessRecord {
    pub profile: ProfileId,
    pub kind: AccessKind,
    pub outcome: AccessOutcome,
    pub token: Option<TokenId>,
    pub user: Option<UserId>,
    pub meta: RequestMeta,
    pub status_code: Option<u16>,
    pub response_size: Option<u64>,
    pub cause: String,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings_are_stable() {
        assert_eq!(AccessReason::Owner.as_str(), "owner");
        assert_eq!(AccessReason::NotConnected.as_str(), "not_connected");
        assert_eq!(AccessReason::TokenAuthorized.as_str(), "token_authorized");
        assert_eq!(
            AccessReason::TokenProfileMismatch.as_str(),
            "token_profile_mismatch"
        );
        assert_eq!(AccessReason::DomainNotAllowed.as_str(), "domain_not_allowed");
    }

    #[test]
    fn test_reason_allow_mapping() {
        assert!(AccessReason::Owner.allows());
        assert!(AccessReason::Public.allows());
        assert!(AccessReason::TokenAuthorized.allows());
        assert!(!AccessReason::Blocked.allows());
        assert!(!AccessReason::Private.allows());
        assert!(!AccessReason::TokenInvalid.allows());
    }

    #[test]
    fn test_outcome_strings() {
        assert_eq!(AccessOutcome::Success.as_str(), "success");
        assert_eq!(AccessOutcome::Revoked.as_str(), "revoked");
    }
}
