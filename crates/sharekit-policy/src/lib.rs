//! # sharekit Policy
//!
//! Visibility evaluation for sharekit profiles.
//!
//! ## Overview
//!
//! This crate answers one question: absent any token, may this viewer
//! see this profile, and why? The answer comes from a fixed-order
//! decision cascade over the profile's [`VisibilityPolicy`]:
//!
//! owner -> blocklist -> public -> connections -> network -> private -> custom
//!
//! ## Key Concepts
//!
//! - **ConnectionOracle**: the injected capability interface to the
//!   relationship graph (`are_connected`, `mutual_count`). The engine
//!   never owns or traverses graph data.
//! - **PolicyDecision**: allow/deny plus a machine-readable
//!   [`AccessReason`] callers can assert on.
//! - **CustomRule**: the extension point for the `custom` tier. The
//!   default behaves like the connections tier.
//!
//! [`VisibilityPolicy`]: sharekit_core::VisibilityPolicy
//! [`AccessReason`]: sharekit_core::AccessReason

pub mod engine;
pub mod error;
pub mod oracle;

pub use engine::{ConnectionsFallbackRule, CustomRule, PolicyDecision, PolicyEngine};
pub use error::{PolicyError, Result};
pub use oracle::{ConnectionOracle, EmptyOracle};
