//! # sharekit
//!
//! Unified API for the sharekit profile access-control system.
//!
//! The [`AccessGate`] brings together share tokens, visibility policies,
//! the audit trail, and shares into one interface:
//!
//! ```no_run
//! use std::sync::Arc;
//! use sharekit::{AccessGate, AccessRequest, GateConfig};
//! use sharekit_core::ProfileId;
//! use sharekit_core::UserId;
//! use sharekit_policy::EmptyOracle;
//! use sharekit_store::SqliteStore;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = SqliteStore::open("sharekit.db")?;
//! let gate = AccessGate::new(store, Arc::new(EmptyOracle), GateConfig::default());
//!
//! let decision = gate
//!     .check_access(ProfileId(1), UserId(1), &AccessRequest::anonymous())
//!     .await?;
//! println!("allowed: {} ({})", decision.allowed, decision.reason);
//! # Ok(())
//! # }
//! ```
//!
//! Every decision appends exactly one audit record; audit failures are
//! logged and never fail the request.

pub mod analytics;
pub mod error;
pub mod gate;
pub mod request;

pub use analytics::{ActivityEntry, ProfileAnalytics};
pub use error::{GateError, Result};
pub use gate::{AccessGate, Decision, GateConfig};
pub use request::AccessRequest;
