//! # sharekit Core
//!
//! Domain model for the sharekit profile access-control system.
//!
//! ## Overview
//!
//! This crate holds the pure, storage-free pieces:
//!
//! - **ShareToken**: an opaque bearer credential granting scoped,
//!   time-boxed, usage-capped access to one profile
//! - **VisibilityPolicy**: per-profile privacy settings, blocklist, and
//!   visibility tier
//! - **AccessRecord**: one immutable audit entry per access decision
//! - **Share**: a sharing instance (link, email, embed, ...) that may
//!   bind a token
//!
//! ## Key Invariants
//!
//! - Token secrets are unique, URL-safe, and carry 256 bits of entropy.
//! - Revocation is permanent; expiry is checked lazily at validation
//!   time, never by a background sweep.
//! - A token's view counter never exceeds its cap; once reached, the
//!   token stops validating even while `active` is still true.
//! - The blocklist is checked before tier evaluation and overrides
//!   `public`.

pub mod error;
pub mod policy;
pub mod record;
pub mod share;
pub mod token;
pub mod types;

pub use error::CoreError;
pub use policy::{
    AudienceSettings, PolicyUpdate, SectionVisibility, SharingSettings, VisibilityPolicy,
    VisibilityTier,
};
pub use record::{
    AccessKind, AccessOutcome, AccessReason, AccessRecord, NewAccessRecord, RequestMeta,
};
pub use share::{Share, ShareChannel, ShareEngagement, ShareParams, ShareStatus};
pub use token::{
    Capability, CapabilitySet, IssueParams, ShareToken, TokenKind, TokenUpdate, DEFAULT_TTL_DAYS,
};
pub use types::{now_millis, ProfileId, ShareId, TokenId, TokenSecret, UserId, MILLIS_PER_DAY};
