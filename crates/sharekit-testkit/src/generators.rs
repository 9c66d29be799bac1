//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sharekit_core::{
    CapabilitySet, ProfileId, ShareToken, TokenId, TokenKind, TokenSecret, UserId,
    VisibilityPolicy, VisibilityTier,
};

/// Generate a random ProfileId.
pub fn profile_id() -> impl Strategy<Value = ProfileId> {
    (1i64..=1_000_000).prop_map(ProfileId)
}

/// Generate a random UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    (1i64..=1_000_000).prop_map(UserId)
}

/// Generate a 64-hex-char token secret.
pub fn token_secret() -> impl Strategy<Value = TokenSecret> {
    "[0-9a-f]{64}".prop_map(TokenSecret::new)
}

/// Generate a TokenKind.
pub fn token_kind() -> impl Strategy<Value = TokenKind> {
    prop_oneof![
        Just(TokenKind::View),
        Just(TokenKind::Edit),
        Just(TokenKind::Share),
        Just(TokenKind::Api),
    ]
}

/// Generate a VisibilityTier.
pub fn visibility_tier() -> impl Strategy<Value = VisibilityTier> {
    prop_oneof![
        Just(VisibilityTier::Public),
        Just(VisibilityTier::Connections),
        Just(VisibilityTier::Network),
        Just(VisibilityTier::Private),
        Just(VisibilityTier::Custom),
    ]
}

/// Generate a capability set (view always granted).
pub fn capability_set() -> impl Strategy<Value = CapabilitySet> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(edit, share, download)| {
        CapabilitySet {
            can_view: true,
            can_edit: edit,
            can_share: share,
            can_download: download,
        }
    })
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Parameters for generating a token.
#[derive(Debug, Clone)]
pub struct TokenParams {
    pub profile: ProfileId,
    pub creator: UserId,
    pub secret: TokenSecret,
    pub kind: TokenKind,
    pub capabilities: CapabilitySet,
    pub expires_at: i64,
    pub max_views: Option<u32>,
    pub created_at: i64,
}

impl Arbitrary for TokenParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            profile_id(),
            user_id(),
            token_secret(),
            token_kind(),
            capability_set(),
            timestamp(),
            prop::option::of(1u32..=1000),
            timestamp(),
        )
            .prop_map(
                |(profile, creator, secret, kind, capabilities, expires_at, max_views, created_at)| {
                    TokenParams {
                        profile,
                        creator,
                        secret,
                        kind,
                        capabilities,
                        expires_at,
                        max_views,
                        created_at,
                    }
                },
            )
            .boxed()
    }
}

/// Build a token from generated parameters.
pub fn token_from_params(params: &TokenParams) -> ShareToken {
    ShareToken {
        id: TokenId(0),
        profile: params.profile,
        secret: params.secret.clone(),
        kind: params.kind,
        created_by: params.creator,
        expires_at: params.expires_at,
        active: true,
        capabilities: params.capabilities,
        max_views: params.max_views,
        view_count: 0,
        allowed_domains: Vec::new(),
        purpose: "generated".to_string(),
        description: String::new(),
        metadata: serde_json::Value::Object(Default::default()),
        last_used_at: None,
        last_used_address: None,
        created_at: params.created_at,
    }
}

/// Build a policy with a generated tier.
pub fn policy_with(profile: ProfileId, tier: VisibilityTier, now: i64) -> VisibilityPolicy {
    let mut policy = VisibilityPolicy::new(profile, now);
    policy.tier = tier;
    policy
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_tokens_validate_before_expiry(params: TokenParams) {
            let token = token_from_params(&params);
            // Fresh tokens are valid at any instant up to their expiry.
            prop_assert!(token.is_valid(params.expires_at));
            prop_assert!(!token.is_valid(params.expires_at + 1));
        }

        #[test]
        fn generated_secrets_are_wire_shaped(secret in token_secret()) {
            prop_assert_eq!(secret.as_str().len(), 64);
            prop_assert!(secret.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn tier_wire_names_roundtrip(tier in visibility_tier()) {
            prop_assert_eq!(VisibilityTier::parse(tier.as_str()).unwrap(), tier);
        }

        #[test]
        fn kind_wire_names_roundtrip(kind in token_kind()) {
            prop_assert_eq!(TokenKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
