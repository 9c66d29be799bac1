//! Visibility policies: per-profile privacy settings.
//!
//! Exactly one policy exists per profile, created lazily on first access
//! with the defaults below. Only the profile owner mutates it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::CoreError;
use crate::types::{ProfileId, UserId};

/// Coarse-grained visibility buckets, evaluated absent a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityTier {
    /// Everyone, including anonymous viewers.
    Public,
    /// Direct connections of the owner only.
    Connections,
    /// Anyone sharing at least one mutual connection with the owner.
    Network,
    /// Nobody but the owner.
    Private,
    /// Delegated to a custom rule predicate.
    Custom,
}

impl VisibilityTier {
    /// Parse a tier from its wire name.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "public" => Ok(Self::Public),
            "connections" => Ok(Self::Connections),
            "network" => Ok(Self::Network),
            "private" => Ok(Self::Private),
            "custom" => Ok(Self::Custom),
            other => Err(CoreError::InvalidTier(other.to_string())),
        }
    }

    /// The wire name of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Connections => "connections",
            Self::Network => "network",
            Self::Private => "private",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for VisibilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-section visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionVisibility {
    pub show_contact_info: bool,
    pub show_experience: bool,
    pub show_education: bool,
    pub show_skills: bool,
    pub show_connections: bool,
    pub show_activity: bool,
}

impl Default for SectionVisibility {
    fn default() -> Self {
        Self {
            show_contact_info: true,
            show_experience: true,
            show_education: true,
            show_skills: true,
            show_connections: true,
            show_activity: true,
        }
    }
}

/// Sharing permissions for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingSettings {
    pub allow_public_sharing: bool,
    pub require_approval_for_sharing: bool,
    pub auto_approve_connections: bool,
    /// Upper bound on share/token lifetime the owner will issue.
    pub max_share_duration_days: u32,
    pub require_2fa_for_sensitive: bool,
}

impl Default for SharingSettings {
    fn default() -> Self {
        Self {
            allow_public_sharing: true,
            require_approval_for_sharing: false,
            auto_approve_connections: true,
            max_share_duration_days: 365,
            require_2fa_for_sensitive: false,
        }
    }
}

/// Audience toggles for network-adjacent viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceSettings {
    pub visible_to_alumni: bool,
    pub visible_to_colleagues: bool,
    pub visible_to_group_members: bool,
}

impl Default for AudienceSettings {
    fn default() -> Self {
        Self {
            visible_to_alumni: true,
            visible_to_colleagues: true,
            visible_to_group_members: true,
        }
    }
}

/// A profile's visibility policy.
///
/// The blocklist is authoritative: a blocked identity is denied before
/// tier evaluation, including on `public` profiles. The owner bypasses
/// every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    pub profile: ProfileId,

    /// The overall visibility tier.
    pub tier: VisibilityTier,

    pub sections: SectionVisibility,

    /// Whether the profile appears in search results, and at what tier.
    pub appear_in_search: bool,
    pub search_tier: VisibilityTier,

    pub sharing: SharingSettings,
    pub audience: AudienceSettings,

    /// Identities always denied, regardless of tier.
    pub blocked_users: BTreeSet<UserId>,

    /// Opaque structured payload, evaluated only under the `custom` tier.
    pub custom_rules: serde_json::Value,

    /// Whether successful views are counted for analytics display.
    pub track_views: bool,
    pub show_view_count: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl VisibilityPolicy {
    /// The lazily-created default policy for a profile.
    pub fn new(profile: ProfileId, now: i64) -> Self {
        Self {
            profile,
            tier: VisibilityTier::Connections,
            sections: SectionVisibility::default(),
            appear_in_search: true,
            search_tier: VisibilityTier::Connections,
            sharing: SharingSettings::default(),
            audience: AudienceSettings::default(),
            blocked_users: BTreeSet::new(),
            custom_rules: serde_json::Value::Object(Default::default()),
            track_views: true,
            show_view_count: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether a viewer is on the blocklist.
    pub fn is_blocked(&self, viewer: UserId) -> bool {
        self.blocked_users.contains(&viewer)
    }

    /// Add a user to the blocklist.
    pub fn block(&mut self, user: UserId) {
        self.blocked_users.insert(user);
    }

    /// Remove a user from the blocklist.
    pub fn unblock(&mut self, user: UserId) {
        self.blocked_users.remove(&user);
    }
}

/// Partial update of a visibility policy.
///
/// Only the named fields are applied; `blocked_users` replaces the whole
/// blocklist when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub tier: Option<VisibilityTier>,
    pub show_contact_info: Option<bool>,
    pub show_experience: Option<bool>,
    pub show_education: Option<bool>,
    pub show_skills: Option<bool>,
    pub show_connections: Option<bool>,
    pub show_activity: Option<bool>,
    pub appear_in_search: Option<bool>,
    pub search_tier: Option<VisibilityTier>,
    pub allow_public_sharing: Option<bool>,
    pub require_approval_for_sharing: Option<bool>,
    pub auto_approve_connections: Option<bool>,
    pub visible_to_alumni: Option<bool>,
    pub visible_to_colleagues: Option<bool>,
    pub visible_to_group_members: Option<bool>,
    pub custom_rules: Option<serde_json::Value>,
    pub max_share_duration_days: Option<u32>,
    pub require_2fa_for_sensitive: Option<bool>,
    pub track_views: Option<bool>,
    pub show_view_count: Option<bool>,
    pub blocked_users: Option<BTreeSet<UserId>>,
}

impl PolicyUpdate {
    /// Apply this update to a policy at time `now`.
    pub fn apply(&self, policy: &mut VisibilityPolicy, now: i64) {
        if let Some(tier) = self.tier {
            policy.tier = tier;
        }
        if let Some(v) = self.show_contact_info {
            policy.sections.show_contact_info = v;
        }
        if let Some(v) = self.show_experience {
            policy.sections.show_experience = v;
        }
        if let Some(v) = self.show_education {
            policy.sections.show_education = v;
        }
        if let Some(v) = self.show_skills {
            policy.sections.show_skills = v;
        }
        if let Some(v) = self.show_connections {
            policy.sections.show_connections = v;
        }
        if let Some(v) = self.show_activity {
            policy.sections.show_activity = v;
        }
        if let Some(v) = self.appear_in_search {
            policy.appear_in_search = v;
        }
        if let Some(tier) = self.search_tier {
            policy.search_tier = tier;
        }
        if let Some(v) = self.allow_public_sharing {
            policy.sharing.allow_public_sharing = v;
        }
        if let Some(v) = self.require_approval_for_sharing {
            policy.sharing.require_approval_for_sharing = v;
        }
        if let Some(v) = self.auto_approve_connections {
            policy.sharing.auto_approve_connections = v;
        }
        if let Some(v) = self.visible_to_alumni {
            policy.audience.visible_to_alumni = v;
        }
        if let Some(v) = self.visible_to_colleagues {
            policy.audience.visible_to_colleagues = v;
        }
        if let Some(v) = self.visible_to_group_members {
            policy.audience.visible_to_group_members = v;
        }
        if let Some(ref rules) = self.custom_rules {
            policy.custom_rules = rules.clone();
        }
        if let Some(v) = self.max_share_duration_days {
            policy.sharing.max_share_duration_days = v;
        }
        if let Some(v) = self.require_2fa_for_sensitive {
            policy.sharing.require_2fa_for_sensitive = v;
        }
        if let Some(v) = self.track_views {
            policy.track_views = v;
        }
        if let Some(v) = self.show_view_count {
            policy.show_view_count = v;
        }
        if let Some(ref blocked) = self.blocked_users {
            policy.blocked_users = blocked.clone();
        }
        policy.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_is_connections() {
        let policy = VisibilityPolicy::new(ProfileId(1), 0);
        assert_eq!(policy.tier, VisibilityTier::Connections);
        assert!(policy.sharing.allow_public_sharing);
        assert_eq!(policy.sharing.max_share_duration_days, 365);
    }

    #[test]
    fn test_block_and_unblock() {
        let mut policy = VisibilityPolicy::new(ProfileId(1), 0);
        let user = UserId(7);

        assert!(!policy.is_blocked(user));
        policy.block(user);
        assert!(policy.is_blocked(user));
        policy.unblock(user);
        assert!(!policy.is_blocked(user));
    }

    #[test]
    fn test_update_replaces_blocklist_wholesale() {
        let mut policy = VisibilityPolicy::new(ProfileId(1), 0);
        policy.block(UserId(1));
        policy.block(UserId(2));

        let update = PolicyUpdate {
            blocked_users: Some([UserId(3)].into_iter().collect()),
            ..Default::default()
        };
        update.apply(&mut policy, 100);

        assert!(!policy.is_blocked(UserId(1)));
        assert!(policy.is_blocked(UserId(3)));
        assert_eq!(policy.updated_at, 100);
    }

    #[test]
    fn test_update_applies_only_named_fields() {
        let mut policy = VisibilityPolicy::new(ProfileId(1), 0);
        let update = PolicyUpdate {
            tier: Some(VisibilityTier::Public),
            show_activity: Some(false),
            ..Default::default()
        };
        update.apply(&mut policy, 50);

        assert_eq!(policy.tier, VisibilityTier::Public);
        assert!(!policy.sections.show_activity);
        assert!(policy.sections.show_skills); // Untouched
        assert!(policy.appear_in_search); // Untouched
    }

    #[test]
    fn test_tier_parse_rejects_unknown() {
        assert!(VisibilityTier::parse("network").is_ok());
        assert!(VisibilityTier::parse("friends").is_err());
    }
}
