//! Strong type definitions for sharekit.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a profile (the thing being shared).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub i64);

impl ProfileId {
    /// Get the raw numeric value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile:{}", self.0)
    }
}

impl From<i64> for ProfileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a user (viewer, owner, or token creator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Get the raw numeric value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Row identifier of a share token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub i64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

impl From<i64> for TokenId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Row identifier of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShareId(pub i64);

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "share:{}", self.0)
    }
}

impl From<i64> for ShareId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An opaque bearer secret.
///
/// The secret is the whole credential, so it never appears in `Debug`
/// output or logs. Compare with `as_str` only at the validation boundary.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);

impl TokenSecret {
    /// Wrap an existing secret string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSecret(..redacted..)")
    }
}

impl fmt::Display for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display enough to correlate in logs without leaking the credential.
        // Truncation is by chars: externally supplied secrets need not be
        // ASCII.
        if self.0.chars().count() >= 8 {
            let prefix: String = self.0.chars().take(8).collect();
            write!(f, "{prefix}…")
        } else {
            write!(f, "…")
        }
    }
}

impl From<String> for TokenSecret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TokenSecret {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Get current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

/// Milliseconds in one day, for TTL arithmetic.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_id_display() {
        let id = ProfileId(42);
        assert_eq!(format!("{}", id), "profile:42");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = TokenSecret::new("deadbeefdeadbeefdeadbeef");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("deadbeef"));
    }

    #[test]
    fn test_secret_display_truncates() {
        let secret = TokenSecret::new("0123456789abcdef");
        let display = format!("{}", secret);
        assert!(display.starts_with("01234567"));
        assert!(!display.contains("9abcdef"));
    }

    #[test]
    fn test_secret_display_handles_multibyte() {
        let secret = TokenSecret::new("ünïcødé-secret-material");
        assert_eq!(format!("{}", secret), "ünïcødé-…");

        let short = TokenSecret::new("ünï");
        assert_eq!(format!("{}", short), "…");
    }
}
