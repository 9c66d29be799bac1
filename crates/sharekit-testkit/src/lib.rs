//! # sharekit Testkit
//!
//! Testing utilities for sharekit.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory [`AccessGate`] wired to a programmable
//!   [`StaticOracle`], plus token-issuance shortcuts
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,ignore
//! use sharekit_testkit::TestFixture;
//! use sharekit_core::{ProfileId, UserId};
//!
//! let fixture = TestFixture::new();
//! fixture.oracle.connect(UserId(1), UserId(2));
//! let token = fixture
//!     .issue_view_token(ProfileId(1), UserId(1), Some(5))
//!     .await;
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sharekit_testkit::generators::{token_from_params, TokenParams};
//!
//! proptest! {
//!     #[test]
//!     fn revoked_tokens_never_validate(params: TokenParams) {
//!         let mut token = token_from_params(&params);
//!         token.revoke();
//!         prop_assert!(!token.is_valid(0));
//!     }
//! }
//! ```
//!
//! [`AccessGate`]: sharekit::AccessGate
//! [`StaticOracle`]: fixtures::StaticOracle

pub mod fixtures;
pub mod generators;

pub use fixtures::{StaticOracle, TestFixture};
pub use generators::{token_from_params, TokenParams};
