//! Incoming access requests and bearer-token extraction.
//!
//! The gate is transport-agnostic: callers copy whatever their HTTP
//! layer saw into an [`AccessRequest`] and the gate takes it from there.

use sharekit_core::{AccessKind, RequestMeta, UserId};

/// One attempt to access a profile, as seen by the transport layer.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// The authenticated caller, `None` for anonymous requests.
    pub viewer: Option<UserId>,

    /// What kind of access is being attempted.
    pub kind: AccessKind,

    /// Raw `Authorization` header value, if present.
    pub authorization: Option<String>,

    /// `token` query parameter, if present.
    pub query_token: Option<String>,

    /// `token` field of the request body, if present.
    pub body_token: Option<String>,

    /// Request metadata captured for the audit trail.
    pub meta: RequestMeta,
}

impl Default for AccessRequest {
    fn default() -> Self {
        Self {
            viewer: None,
            kind: AccessKind::View,
            authorization: None,
            query_token: None,
            body_token: None,
            meta: RequestMeta::default(),
        }
    }
}

impl AccessRequest {
    /// An anonymous view request with no token material.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A view request from an authenticated user.
    pub fn from_user(viewer: UserId) -> Self {
        Self {
            viewer: Some(viewer),
            ..Self::default()
        }
    }

    /// Attach a bearer secret via the `Authorization` header.
    pub fn with_bearer(mut self, secret: impl Into<String>) -> Self {
        self.authorization = Some(format!("Bearer {}", secret.into()));
        self
    }

    /// Attach request metadata.
    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Extract the bearer secret, if any.
    ///
    /// Priority order: `Authorization: Bearer` header, then the `token`
    /// query parameter, then the `token` body field. The first non-empty
    /// source wins; later sources are not consulted.
    pub fn bearer_secret(&self) -> Option<&str> {
        if let Some(header) = &self.authorization {
            if let Some(rest) = header.strip_prefix("Bearer ") {
                let rest = rest.trim();
                if !rest.is_empty() {
                    return Some(rest);
                }
            }
        }

        if let Some(token) = &self.query_token {
            if !token.is_empty() {
                return Some(token);
            }
        }

        if let Some(token) = &self.body_token {
            if !token.is_empty() {
                return Some(token);
            }
        }

        None
    }
}

/// Extract the host from a referer URL, lowercased, without port.
///
/// Returns `None` when the referer is empty or has no recognizable host.
pub(crate) fn referer_host(referer: &str) -> Option<String> {
    let rest = referer
        .strip_prefix("https://")
        .or_else(|| referer.strip_prefix("http://"))
        .unwrap_or(referer);

    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').last()?; // Drop userinfo if present
    let host = host.split(':').next()?; // Drop port

    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Whether `host` matches `domain` exactly or as a subdomain.
pub(crate) fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}
